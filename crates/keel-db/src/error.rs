//! Error types for keel-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// A statement of a migration failed (D002)
    #[error("[D002] SQL execution failed at statement {index}: {message}\n  statement: {statement}")]
    ExecutionError {
        /// 0-based position of the statement within the payload
        index: usize,
        statement: String,
        message: String,
    },

    /// Version store read or write failed (D003)
    #[error("[D003] Version store failed: {0}")]
    StoreError(String),

    /// Another process holds the migration lock (D004)
    #[error("[D004] Migration lock '{key}' is held by another process")]
    LockBusy { key: String },

    /// Lock could not be acquired or released (D005)
    #[error("[D005] Migration lock failed: {0}")]
    LockError(String),

    /// Transaction management error (D006)
    #[error("[D006] Transaction failed: {0}")]
    TransactionError(String),

    /// Mutex poisoned (D007)
    #[error("[D007] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Not supported by this backend (D008)
    #[error("[D008] Feature not supported by {backend}: {feature}")]
    Unsupported { backend: String, feature: String },
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;
