//! Database capability traits
//!
//! Implementations must be Send + Sync for async operation.

use crate::error::DbResult;
use async_trait::async_trait;
use keel_core::VersionRecord;

/// Executes migration payloads against the target database
#[async_trait]
pub trait Driver: Send + Sync {
    /// Whether schema changes can be rolled back inside a transaction
    fn supports_transactional_ddl(&self) -> bool;

    /// Execute `statements` in order.
    ///
    /// With `within_transaction` the statements commit or roll back together.
    /// A failing statement is reported as `DbError::ExecutionError` with its
    /// 0-based index.
    async fn execute(&self, statements: &[String], within_transaction: bool) -> DbResult<()>;

    /// Check if a table or view exists. Accepts `schema.name`.
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}

/// Persists the applied schema version and dirty flag
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Current record; `VersionRecord::EMPTY` for a never-migrated database.
    async fn read(&self) -> DbResult<VersionRecord>;

    /// Replace the record in a single transaction. Writing the same record
    /// twice leaves the same state.
    async fn write(&self, record: VersionRecord) -> DbResult<()>;
}

/// Proof of lock ownership, returned by [`Locker::acquire`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    key: String,
    holder: String,
}

impl LockHandle {
    pub fn new(key: impl Into<String>, holder: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            holder: holder.into(),
        }
    }

    /// The database-scoped lock key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Identifier of this acquisition
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

/// Database-scoped mutual exclusion between migration runs
#[async_trait]
pub trait Locker: Send + Sync {
    /// Take the lock without waiting; `DbError::LockBusy` if it is held.
    async fn acquire(&self) -> DbResult<LockHandle>;

    /// Give the lock back. Releasing twice, or after the lock was cleared,
    /// is not an error.
    async fn release(&self, handle: &LockHandle) -> DbResult<()>;

    /// Clear a lock left behind by a crashed run, whoever holds it.
    async fn force_release(&self) -> DbResult<()>;
}
