//! Migration sources
//!
//! A [`MigrationSource`] enumerates the available migration units. Every
//! enumeration is validated into a [`MigrationSet`]: units sorted by version,
//! versions unique and non-zero, every unit carrying forward statements.
//! Validation failures surface before anything touches the database.

mod directory;

pub use directory::DirectorySource;

use crate::error::{CoreError, CoreResult};
use crate::unit::MigrationUnit;
use crate::version::SchemaVersion;

/// An ordered, restartable enumeration of migration units
pub trait MigrationSource: Send + Sync {
    /// Load and validate every unit, in ascending version order.
    ///
    /// Each call re-enumerates the underlying store.
    fn list(&self) -> CoreResult<MigrationSet>;

    /// Units with a version strictly greater than `version`, ascending.
    fn units_after(&self, version: SchemaVersion) -> CoreResult<Vec<MigrationUnit>> {
        Ok(self.list()?.units_after(version).to_vec())
    }

    /// Human-readable location, used in logs.
    fn location(&self) -> String;
}

/// A validated, version-ordered collection of migration units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSet {
    units: Vec<MigrationUnit>,
}

impl MigrationSet {
    /// Validate `units` and sort them by version.
    pub fn from_units(mut units: Vec<MigrationUnit>) -> CoreResult<Self> {
        units.sort_by_key(|u| u.version);

        for unit in &units {
            if unit.version.is_none() {
                return Err(CoreError::MalformedUnit {
                    location: unit.to_string(),
                    reason: "version 0 is reserved for the unmigrated state".to_string(),
                });
            }
            if unit.up.is_empty() {
                return Err(CoreError::MalformedUnit {
                    location: unit.to_string(),
                    reason: "up migration contains no statements".to_string(),
                });
            }
        }

        if let Some(pair) = units.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(CoreError::DuplicateVersion {
                version: pair[0].version,
                first: pair[0].to_string(),
                second: pair[1].to_string(),
            });
        }

        Ok(Self { units })
    }

    /// Require versions to run `1..=n` without holes.
    pub fn check_contiguous(&self) -> CoreResult<()> {
        for (expected, unit) in (1u64..).zip(&self.units) {
            if unit.version.get() != expected {
                return Err(CoreError::VersionGap {
                    expected: SchemaVersion::new(expected),
                    found: unit.version,
                });
            }
        }
        Ok(())
    }

    /// All units, ascending.
    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units with a version strictly greater than `version`.
    pub fn units_after(&self, version: SchemaVersion) -> &[MigrationUnit] {
        let start = self.units.partition_point(|u| u.version <= version);
        &self.units[start..]
    }

    /// Units with `after < version <= up_to`, ascending.
    pub fn units_between(&self, after: SchemaVersion, up_to: SchemaVersion) -> &[MigrationUnit] {
        if up_to <= after {
            return &[];
        }
        let start = self.units.partition_point(|u| u.version <= after);
        let end = self.units.partition_point(|u| u.version <= up_to);
        &self.units[start..end]
    }

    /// Look up the unit with exactly `version`.
    pub fn get(&self, version: SchemaVersion) -> Option<&MigrationUnit> {
        self.units
            .binary_search_by_key(&version, |u| u.version)
            .ok()
            .map(|idx| &self.units[idx])
    }

    /// Whether `version` names a unit, or is the unmigrated state.
    pub fn is_known(&self, version: SchemaVersion) -> bool {
        version.is_none() || self.get(version).is_some()
    }

    /// Highest available version, or `NONE` for an empty set.
    pub fn latest(&self) -> SchemaVersion {
        self.units
            .last()
            .map(|u| u.version)
            .unwrap_or(SchemaVersion::NONE)
    }

    /// Version of the unit directly below `version`, or `NONE`.
    pub fn previous(&self, version: SchemaVersion) -> SchemaVersion {
        let idx = self.units.partition_point(|u| u.version < version);
        if idx == 0 {
            SchemaVersion::NONE
        } else {
            self.units[idx - 1].version
        }
    }
}

/// An in-memory source, for embedding migrations in a binary
#[derive(Debug, Clone)]
pub struct StaticSource {
    set: MigrationSet,
}

impl StaticSource {
    /// Validate the given units up front.
    pub fn new(units: Vec<MigrationUnit>) -> CoreResult<Self> {
        Ok(Self {
            set: MigrationSet::from_units(units)?,
        })
    }
}

impl MigrationSource for StaticSource {
    fn list(&self) -> CoreResult<MigrationSet> {
        Ok(self.set.clone())
    }

    fn location(&self) -> String {
        format!("static ({} units)", self.set.len())
    }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
