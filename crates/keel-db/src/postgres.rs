//! PostgreSQL database backend implementation
//!
//! The migration lock is a session-level advisory lock keyed on the target
//! database and version table, so it is released by the server if the
//! process dies.

use crate::connect::StoreOptions;
use crate::error::{DbError, DbResult};
use crate::traits::{Driver, LockHandle, Locker, VersionStore};
use async_trait::async_trait;
use keel_core::{DatabaseTarget, DatabaseUrl, SchemaVersion, TlsMode, VersionRecord};
use keel_sql::{PostgresDialect, SqlDialect};
use sha2::{Digest, Sha256};
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

/// Schema name used for lock keys when none is configured
const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL database backend
pub struct PostgresBackend {
    client: Client,
    options: StoreOptions,
    database: String,
    lock_id: i64,
}

impl PostgresBackend {
    /// Connect to the database named by `url`.
    ///
    /// Only plaintext connections are linked in; `sslmode` values that
    /// demand TLS are rejected before dialing.
    pub async fn connect(url: &DatabaseUrl, options: StoreOptions) -> DbResult<Self> {
        let DatabaseTarget::Postgres {
            host,
            database,
            tls,
        } = url.target()
        else {
            return Err(DbError::ConnectionError(format!(
                "not a PostgreSQL URL: {url}"
            )));
        };

        if !matches!(tls, TlsMode::Disable | TlsMode::Prefer) {
            return Err(DbError::Unsupported {
                backend: "postgres".to_string(),
                feature: format!("sslmode={tls}"),
            });
        }

        let (client, connection) = tokio_postgres::connect(url.as_str(), NoTls)
            .await
            .map_err(|e| DbError::ConnectionError(format!("{host}/{database}: {}", pg_message(&e))))?;

        let target = format!("{host}/{database}");
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("PostgreSQL connection to {target} closed: {e}");
            }
        });

        log::debug!("Connected to PostgreSQL at {url}");
        let lock_id = lock_id(
            database,
            options.schema.as_deref().unwrap_or(DEFAULT_SCHEMA),
            &options.migrations_table,
        );
        Ok(Self {
            client,
            options,
            database: database.clone(),
            lock_id,
        })
    }

    /// The advisory lock key this backend takes
    pub fn lock_id(&self) -> i64 {
        self.lock_id
    }

    fn qualified(&self, table: &str) -> String {
        PostgresDialect::new().quote_relation(self.options.schema.as_deref(), table)
    }

    fn lock_key(&self) -> String {
        format!("{}:{}", self.database, self.lock_id)
    }

    async fn table_exists(&self, schema: Option<&str>, name: &str) -> DbResult<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                     SELECT 1 FROM information_schema.tables
                     WHERE table_schema = COALESCE($1::text, current_schema())
                       AND table_name = $2::text
                 )",
                &[&schema, &name],
            )
            .await
            .map_err(|e| DbError::ExecutionError {
                index: 0,
                statement: "information_schema.tables lookup".to_string(),
                message: pg_message(&e),
            })?;
        Ok(row.get(0))
    }

    async fn ensure_version_table(&self) -> DbResult<()> {
        let mut sql = String::new();
        if let Some(schema) = &self.options.schema {
            sql.push_str(&format!(
                "CREATE SCHEMA IF NOT EXISTS {};\n",
                PostgresDialect::new().quote_ident(schema)
            ));
        }
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                 version BIGINT NOT NULL PRIMARY KEY,
                 dirty   BOOLEAN NOT NULL
             )",
            self.qualified(&self.options.migrations_table)
        ));
        self.client
            .batch_execute(&sql)
            .await
            .map_err(|e| DbError::StoreError(format!("failed to create version table: {}", pg_message(&e))))
    }

    async fn rollback(&self) {
        if let Err(e) = self.client.batch_execute("ROLLBACK").await {
            log::warn!("ROLLBACK failed: {}", pg_message(&e));
        }
    }
}

#[async_trait]
impl Driver for PostgresBackend {
    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    async fn execute(&self, statements: &[String], within_transaction: bool) -> DbResult<()> {
        if within_transaction {
            self.client
                .batch_execute("BEGIN")
                .await
                .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {}", pg_message(&e))))?;
        }

        for (index, statement) in statements.iter().enumerate() {
            if let Err(e) = self.client.batch_execute(statement).await {
                if within_transaction {
                    self.rollback().await;
                }
                return Err(DbError::ExecutionError {
                    index,
                    statement: statement.clone(),
                    message: pg_message(&e),
                });
            }
        }

        if within_transaction {
            if let Err(e) = self.client.batch_execute("COMMIT").await {
                self.rollback().await;
                return Err(DbError::TransactionError(format!(
                    "COMMIT failed: {}",
                    pg_message(&e)
                )));
            }
        }
        Ok(())
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        let (schema, table) = match name.rfind('.') {
            Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
            None => (self.options.schema.as_deref(), name),
        };
        self.table_exists(schema, table).await
    }

    fn db_type(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl VersionStore for PostgresBackend {
    async fn read(&self) -> DbResult<VersionRecord> {
        let table = &self.options.migrations_table;
        if !self
            .table_exists(self.options.schema.as_deref(), table)
            .await?
        {
            return Ok(VersionRecord::EMPTY);
        }

        let sql = format!("SELECT version, dirty FROM {} LIMIT 1", self.qualified(table));
        let row = self
            .client
            .query_opt(&sql, &[])
            .await
            .map_err(|e| DbError::StoreError(format!("failed to read version: {}", pg_message(&e))))?;

        match row {
            Some(row) => {
                let version: i64 = row.get(0);
                let dirty: bool = row.get(1);
                let version = SchemaVersion::from_i64(version).ok_or_else(|| {
                    DbError::StoreError(format!("negative version {version} in {table}"))
                })?;
                Ok(VersionRecord { version, dirty })
            }
            None => Ok(VersionRecord::EMPTY),
        }
    }

    async fn write(&self, record: VersionRecord) -> DbResult<()> {
        self.ensure_version_table().await?;
        let table = self.qualified(&self.options.migrations_table);

        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| DbError::StoreError(format!("BEGIN failed: {}", pg_message(&e))))?;

        let mut result = self
            .client
            .batch_execute(&format!("TRUNCATE {table}"))
            .await;
        if result.is_ok() && !record.is_empty() {
            result = self
                .client
                .execute(
                    &format!("INSERT INTO {table} (version, dirty) VALUES ($1, $2)"),
                    &[&record.version.as_i64(), &record.dirty],
                )
                .await
                .map(|_| ());
        }

        if let Err(e) = result {
            self.rollback().await;
            return Err(DbError::StoreError(format!(
                "failed to write version {record}: {}",
                pg_message(&e)
            )));
        }

        if let Err(e) = self.client.batch_execute("COMMIT").await {
            self.rollback().await;
            return Err(DbError::StoreError(format!(
                "COMMIT failed: {}",
                pg_message(&e)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Locker for PostgresBackend {
    async fn acquire(&self) -> DbResult<LockHandle> {
        let row = self
            .client
            .query_one("SELECT pg_try_advisory_lock($1)", &[&self.lock_id])
            .await
            .map_err(|e| DbError::LockError(format!("failed to acquire lock: {}", pg_message(&e))))?;

        if row.get::<_, bool>(0) {
            Ok(LockHandle::new(self.lock_key(), Uuid::new_v4().to_string()))
        } else {
            Err(DbError::LockBusy {
                key: self.lock_key(),
            })
        }
    }

    async fn release(&self, handle: &LockHandle) -> DbResult<()> {
        let row = self
            .client
            .query_one("SELECT pg_advisory_unlock($1)", &[&self.lock_id])
            .await
            .map_err(|e| DbError::LockError(format!("failed to release lock: {}", pg_message(&e))))?;

        if !row.get::<_, bool>(0) {
            log::debug!("Lock {} was not held by this session", handle.key());
        }
        Ok(())
    }

    async fn force_release(&self) -> DbResult<()> {
        // Advisory locks belong to sessions; a crashed session has already
        // dropped its locks, so only this session's own can be cleared.
        self.client
            .batch_execute("SELECT pg_advisory_unlock_all()")
            .await
            .map_err(|e| DbError::LockError(format!("failed to clear locks: {}", pg_message(&e))))?;
        log::info!(
            "Advisory locks are released when their session ends; nothing else to clear for {}",
            self.lock_key()
        );
        Ok(())
    }
}

/// Advisory lock key for a database, schema and version table.
///
/// The first eight bytes of the SHA-256 digest, read as a big-endian `i64`.
pub fn lock_id(database: &str, schema: &str, table: &str) -> i64 {
    let digest = Sha256::digest(format!("{database}:{schema}:{table}").as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Server message for database errors, the full error otherwise
fn pg_message(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => err.to_string(),
    }
}
