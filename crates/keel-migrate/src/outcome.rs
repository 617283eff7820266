//! Results of engine operations.

use keel_core::{MigrationSet, SchemaVersion, VersionRecord};
use serde::Serialize;

/// Terminal state of a successful up/down/goto/steps call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Nothing to apply; the schema stays at this version.
    NoChange { version: SchemaVersion },
    /// Units were applied or reverted, in the order listed.
    Migrated {
        from: SchemaVersion,
        to: SchemaVersion,
        applied: Vec<SchemaVersion>,
    },
    /// Production target without permission to migrate; nothing was done.
    Deferred { version: SchemaVersion },
}

impl MigrationOutcome {
    /// Schema version once the call returned
    pub fn final_version(&self) -> SchemaVersion {
        match self {
            MigrationOutcome::NoChange { version } | MigrationOutcome::Deferred { version } => {
                *version
            }
            MigrationOutcome::Migrated { to, .. } => *to,
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, MigrationOutcome::NoChange { .. })
    }
}

/// Where a unit stands relative to the version record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Applied,
    /// The recorded version, flagged dirty
    Dirty,
    Pending,
}

/// One row of [`StatusReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    pub version: SchemaVersion,
    pub label: String,
    pub state: UnitState,
    pub has_down: bool,
    pub transactional: bool,
}

/// Source units annotated with the current record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub current: VersionRecord,
    /// Whether the recorded version is 0 or a unit in the source
    pub current_known: bool,
    pub latest: SchemaVersion,
    pub units: Vec<UnitStatus>,
}

impl StatusReport {
    pub(crate) fn new(set: &MigrationSet, current: VersionRecord) -> Self {
        let units = set
            .units()
            .iter()
            .map(|unit| {
                let state = if unit.version > current.version {
                    UnitState::Pending
                } else if unit.version == current.version && current.dirty {
                    UnitState::Dirty
                } else {
                    UnitState::Applied
                };
                UnitStatus {
                    version: unit.version,
                    label: unit.label.clone(),
                    state,
                    has_down: unit.has_down(),
                    transactional: unit.transactional,
                }
            })
            .collect();

        Self {
            current,
            current_known: set.is_known(current.version),
            latest: set.latest(),
            units,
        }
    }

    pub fn pending(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.state == UnitState::Pending)
            .count()
    }
}
