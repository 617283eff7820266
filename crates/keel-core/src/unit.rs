//! Migration units

use serde::Serialize;
use std::fmt;

use crate::version::SchemaVersion;

/// Direction a migration is applied in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// One versioned schema change.
///
/// `up` holds the forward statements in execution order and is never empty
/// once the unit has passed source validation. `down` is the optional reverse
/// change; an empty `down` is a deliberate no-op revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub version: SchemaVersion,
    pub label: String,
    pub up: Vec<String>,
    pub down: Option<Vec<String>>,
    /// Whether the unit may be wrapped in a transaction. Cleared for
    /// statements that refuse to run inside one (e.g. `CREATE INDEX
    /// CONCURRENTLY`).
    pub transactional: bool,
}

impl MigrationUnit {
    /// Create a transactional unit without a reverse change
    pub fn new(version: SchemaVersion, label: impl Into<String>, up: Vec<String>) -> Self {
        Self {
            version,
            label: label.into(),
            up,
            down: None,
            transactional: true,
        }
    }

    /// Attach the reverse change
    pub fn with_down(mut self, down: Vec<String>) -> Self {
        self.down = Some(down);
        self
    }

    /// Mark the unit as unsafe to run inside a transaction
    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    /// Whether the unit can be reverted
    pub fn has_down(&self) -> bool {
        self.down.is_some()
    }

    /// Statements for the given direction, if the unit has them
    pub fn statements(&self, direction: Direction) -> Option<&[String]> {
        match direction {
            Direction::Up => Some(&self.up),
            Direction::Down => self.down.as_deref(),
        }
    }
}

impl fmt::Display for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.version, self.label)
    }
}
