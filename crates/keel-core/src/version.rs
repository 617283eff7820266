//! Schema versions and the persisted version record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point in migration history.
///
/// Versions are totally ordered; [`SchemaVersion::NONE`] (zero) means no
/// migration has been applied. Values are capped at `i64::MAX` so every
/// version fits a signed 64-bit database column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct SchemaVersion(u64);

impl SchemaVersion {
    /// No migrations applied.
    pub const NONE: SchemaVersion = SchemaVersion(0);

    /// Largest representable version.
    pub const MAX: SchemaVersion = SchemaVersion(i64::MAX as u64);

    /// Create a version, panicking if it exceeds [`SchemaVersion::MAX`].
    ///
    /// Prefer [`try_new`](Self::try_new) when handling untrusted input.
    pub fn new(version: u64) -> Self {
        Self::try_new(version).expect("schema version must fit in i64")
    }

    /// Create a version, returning `None` if it exceeds [`SchemaVersion::MAX`].
    pub fn try_new(version: u64) -> Option<Self> {
        if version <= Self::MAX.0 {
            Some(Self(version))
        } else {
            None
        }
    }

    /// Convert from a signed database column value.
    pub fn from_i64(version: i64) -> Option<Self> {
        u64::try_from(version).ok().map(Self)
    }

    /// The raw version number.
    pub fn get(self) -> u64 {
        self.0
    }

    /// The version as a signed database column value.
    pub fn as_i64(self) -> i64 {
        // Lossless: construction caps the value at i64::MAX.
        self.0 as i64
    }

    /// Whether this is the "nothing applied" version.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid schema version '{s}': {e}"))?;
        Self::try_new(raw).ok_or_else(|| format!("schema version {raw} is too large"))
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        SchemaVersion::try_new(raw)
            .ok_or_else(|| serde::de::Error::custom("schema version must fit in i64"))
    }
}

/// The migration state persisted in the target database.
///
/// `dirty` is set before a unit starts and cleared once it completes; a
/// record left dirty means a unit may be half-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: SchemaVersion,
    pub dirty: bool,
}

impl VersionRecord {
    /// State of a database that has never been migrated.
    pub const EMPTY: VersionRecord = VersionRecord {
        version: SchemaVersion::NONE,
        dirty: false,
    };

    /// A completed migration at `version`.
    pub fn clean(version: SchemaVersion) -> Self {
        Self {
            version,
            dirty: false,
        }
    }

    /// A migration to `version` that has started but not confirmed completion.
    pub fn dirty(version: SchemaVersion) -> Self {
        Self {
            version,
            dirty: true,
        }
    }

    /// Whether this record needs a row in the version table.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dirty {
            write!(f, "{} (dirty)", self.version)
        } else {
            write!(f, "{}", self.version)
        }
    }
}

#[cfg(test)]
#[path = "version_test.rs"]
mod tests;
