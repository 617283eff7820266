//! Error types for the migration engine.

use keel_core::{CoreError, Direction, SchemaVersion};
use keel_db::DbError;
use thiserror::Error;

/// Migration engine errors.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The migration source could not be loaded or failed validation (M001).
    #[error("[M001] Invalid migration source")]
    Source(#[from] CoreError),

    /// Another run holds the migration lock (M002).
    #[error("[M002] Migration lock '{key}' is held by another run")]
    LockBusy { key: String },

    /// The lock could not be taken (M003).
    #[error("[M003] Migration lock failed")]
    Lock(#[source] DbError),

    /// A previous run stopped part-way through a unit (M004).
    #[error(
        "[M004] Database is dirty at version {version}: a migration did not complete. \
         Repair the schema by hand, then run `keel force <version>`"
    )]
    DirtyState { version: SchemaVersion },

    /// The version record could not be read or written (M005).
    #[error("[M005] Version store failed")]
    Store(#[source] DbError),

    /// A unit's statements failed; the record is left dirty (M006).
    #[error("[M006] Migration {version} ({direction}) failed")]
    MigrationFailed {
        version: SchemaVersion,
        direction: Direction,
        #[source]
        cause: DbError,
    },

    /// A requested or recorded version has no unit in the source (M007).
    #[error("[M007] Unknown version {version}: no migration with this version in {location}")]
    UnknownVersion {
        version: SchemaVersion,
        location: String,
    },

    /// A unit to revert has no down migration (M008).
    #[error("[M008] Migration {version} has no down migration")]
    MissingDown { version: SchemaVersion },

    /// A relation existence check failed (M009).
    #[error("[M009] Verification query failed")]
    Verify(#[source] DbError),
}

/// Result type alias for [`MigrateError`].
pub type MigrateResult<T> = Result<T, MigrateError>;

impl MigrateError {
    /// Map a lock acquisition failure, keeping contention distinct.
    pub(crate) fn from_lock(err: DbError) -> Self {
        match err {
            DbError::LockBusy { key } => MigrateError::LockBusy { key },
            other => MigrateError::Lock(other),
        }
    }
}
