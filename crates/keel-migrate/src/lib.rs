//! keel-migrate - Migration engine for Keel
//!
//! [`Migrator`] takes a migration source and the three database
//! capabilities from `keel-db` and moves the schema between versions. It
//! guarantees that runs against one database never overlap, that every unit
//! is bracketed by a dirty and a clean version write, and that a failed unit
//! blocks further runs until an operator resolves it.

pub mod config;
pub mod error;
pub mod migrator;
pub mod outcome;
pub mod verify;

pub use config::MigratorConfig;
pub use error::{MigrateError, MigrateResult};
pub use migrator::Migrator;
pub use outcome::{MigrationOutcome, StatusReport, UnitState, UnitStatus};
pub use verify::{verify_relations, RelationCheck, VerifyReport};
