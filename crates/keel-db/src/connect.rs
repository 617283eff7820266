//! Backend selection from a database URL

use std::sync::Arc;

use keel_core::{DatabaseConfig, DatabaseTarget, DatabaseUrl};

use crate::duckdb::DuckDbBackend;
use crate::error::DbResult;
use crate::postgres::PostgresBackend;
use crate::traits::{Driver, Locker, VersionStore};

/// Names of the bookkeeping tables a backend maintains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub migrations_table: String,
    pub lock_table: String,
    /// Schema for the bookkeeping tables and unqualified relation lookups
    pub schema: Option<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

impl From<&DatabaseConfig> for StoreOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            migrations_table: config.migrations_table.clone(),
            lock_table: config.lock_table.clone(),
            schema: config.schema.clone(),
        }
    }
}

/// The capabilities of one connected database, as trait objects
#[derive(Clone)]
pub struct Backend {
    pub driver: Arc<dyn Driver>,
    pub store: Arc<dyn VersionStore>,
    pub locker: Arc<dyn Locker>,
}

impl Backend {
    /// Share one backend value across all three capabilities.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: Driver + VersionStore + Locker + 'static,
    {
        Self {
            driver: backend.clone(),
            store: backend.clone(),
            locker: backend,
        }
    }
}

/// Open the database named by `url`.
pub async fn connect(url: &DatabaseUrl, options: StoreOptions) -> DbResult<Backend> {
    match url.target() {
        DatabaseTarget::Postgres { .. } => {
            let backend = PostgresBackend::connect(url, options).await?;
            Ok(Backend::from_shared(Arc::new(backend)))
        }
        DatabaseTarget::DuckDb { path } => {
            let backend = match path {
                Some(path) => DuckDbBackend::from_path(path)?,
                None => DuckDbBackend::in_memory()?,
            };
            Ok(Backend::from_shared(Arc::new(backend.with_options(options))))
        }
    }
}
