//! DuckDB database backend implementation
//!
//! DuckDB has no advisory locks, so the migration lock is a row in a lock
//! table of the target database: inserting the row takes the lock and the
//! primary key rejects a second holder. Clients racing on a fresh database
//! also collide on creating the lock table; DuckDB reports that as a
//! write-write conflict, which counts as contention too.
//!
//! DuckDB allows one read-write process per database file. A second process
//! opening a file that is in use fails in [`DuckDbBackend::from_path`] with
//! `ConnectionError` before it can reach the lock table, so cross-process
//! exclusion on a file database comes from DuckDB's own file lock. Clients
//! sharing one process (see [`DuckDbBackend::try_clone`]) go through the lock
//! table.

use crate::connect::StoreOptions;
use crate::error::{DbError, DbResult};
use crate::traits::{Driver, LockHandle, Locker, VersionStore};
use async_trait::async_trait;
use duckdb::Connection;
use keel_core::{SchemaVersion, VersionRecord};
use keel_sql::{DuckDbDialect, SqlDialect};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const DEFAULT_SCHEMA: &str = "main";

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
    options: StoreOptions,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            options: StoreOptions::default(),
        }
    }

    /// Use non-default bookkeeping table names
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Open a second connection to the same database instance.
    ///
    /// Each clone behaves like a separate client, which is how concurrent
    /// migration runs against one database are modelled in-process.
    pub fn try_clone(&self) -> DbResult<Self> {
        let conn = self
            .connection()?
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            options: self.options.clone(),
        })
    }

    fn connection(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn schema(&self) -> &str {
        self.options.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    fn qualified(&self, table: &str) -> String {
        DuckDbDialect::new().quote_relation(Some(self.schema()), table)
    }

    fn lock_key(&self) -> String {
        format!("{}.{}", self.schema(), self.options.migrations_table)
    }

    fn ensure_schema(&self, conn: &Connection) -> duckdb::Result<()> {
        if self.options.schema.is_some() {
            let sql = format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                DuckDbDialect::new().quote_ident(self.schema())
            );
            conn.execute_batch(&sql)?;
        }
        Ok(())
    }

    fn ensure_version_table(&self, conn: &Connection) -> DbResult<()> {
        self.ensure_schema(conn)
            .and_then(|_| {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                         version BIGINT NOT NULL,
                         dirty   BOOLEAN NOT NULL
                     )",
                    self.qualified(&self.options.migrations_table)
                ))
            })
            .map_err(|e| DbError::StoreError(format!("failed to create version table: {e}")))
    }

    fn ensure_lock_table(&self, conn: &Connection) -> DbResult<()> {
        self.ensure_schema(conn)
            .and_then(|_| {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                         lock_key    VARCHAR PRIMARY KEY,
                         holder      VARCHAR NOT NULL,
                         acquired_at TIMESTAMP NOT NULL DEFAULT current_timestamp
                     )",
                    self.qualified(&self.options.lock_table)
                ))
            })
            .map_err(|e| {
                let msg = e.to_string();
                if is_lock_contention(&msg) {
                    DbError::LockBusy {
                        key: self.lock_key(),
                    }
                } else {
                    DbError::LockError(format!("failed to create lock table: {msg}"))
                }
            })
    }

    /// Execute statements synchronously
    fn execute_sync(&self, statements: &[String], within_transaction: bool) -> DbResult<()> {
        let conn = self.connection()?;

        if within_transaction {
            conn.execute_batch("BEGIN TRANSACTION")
                .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))?;
        }

        for (index, statement) in statements.iter().enumerate() {
            if let Err(e) = conn.execute_batch(statement) {
                if within_transaction {
                    let _ = conn.execute_batch("ROLLBACK");
                }
                return Err(DbError::ExecutionError {
                    index,
                    statement: statement.clone(),
                    message: e.to_string(),
                });
            }
        }

        if within_transaction {
            if let Err(e) = conn.execute_batch("COMMIT") {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(DbError::TransactionError(format!("COMMIT failed: {e}")));
            }
        }
        Ok(())
    }

    /// Check if a relation exists synchronously
    fn relation_exists_sync(&self, conn: &Connection, schema: &str, name: &str) -> DbResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
                duckdb::params![schema, name],
                |row| row.get(0),
            )
            .map_err(|e| DbError::ExecutionError {
                index: 0,
                statement: "information_schema.tables lookup".to_string(),
                message: e.to_string(),
            })?;
        Ok(count > 0)
    }

    fn read_sync(&self) -> DbResult<VersionRecord> {
        let conn = self.connection()?;
        let table = &self.options.migrations_table;
        if !self.relation_exists_sync(&conn, self.schema(), table)? {
            return Ok(VersionRecord::EMPTY);
        }

        let sql = format!(
            "SELECT version, dirty FROM {} LIMIT 1",
            self.qualified(table)
        );
        let row = conn.query_row(&sql, [], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?))
        });

        match row {
            Ok((version, dirty)) => {
                let version = SchemaVersion::from_i64(version).ok_or_else(|| {
                    DbError::StoreError(format!("negative version {version} in {table}"))
                })?;
                Ok(VersionRecord { version, dirty })
            }
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(VersionRecord::EMPTY),
            Err(e) => Err(DbError::StoreError(format!("failed to read version: {e}"))),
        }
    }

    fn write_sync(&self, record: VersionRecord) -> DbResult<()> {
        let conn = self.connection()?;
        self.ensure_version_table(&conn)?;
        let table = self.qualified(&self.options.migrations_table);

        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::StoreError(format!("BEGIN failed: {e}")))?;

        let result = conn
            .execute(&format!("DELETE FROM {table}"), [])
            .and_then(|_| {
                if record.is_empty() {
                    return Ok(0);
                }
                conn.execute(
                    &format!("INSERT INTO {table} (version, dirty) VALUES (?, ?)"),
                    duckdb::params![record.version.as_i64(), record.dirty],
                )
            });

        match result {
            Ok(_) => conn.execute_batch("COMMIT").map_err(|e| {
                let _ = conn.execute_batch("ROLLBACK");
                DbError::StoreError(format!("COMMIT failed: {e}"))
            }),
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(DbError::StoreError(format!(
                    "failed to write version {record}: {e}"
                )))
            }
        }
    }

    fn acquire_sync(&self) -> DbResult<LockHandle> {
        let conn = self.connection()?;
        self.ensure_lock_table(&conn)?;

        let key = self.lock_key();
        let holder = Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO {} (lock_key, holder) VALUES (?, ?)",
            self.qualified(&self.options.lock_table)
        );

        match conn.execute(&sql, duckdb::params![key, holder]) {
            Ok(_) => Ok(LockHandle::new(key, holder)),
            Err(e) => {
                let msg = e.to_string();
                if is_lock_contention(&msg) {
                    Err(DbError::LockBusy { key })
                } else {
                    Err(DbError::LockError(format!("failed to acquire lock: {msg}")))
                }
            }
        }
    }

    fn release_sync(&self, handle: &LockHandle) -> DbResult<()> {
        let conn = self.connection()?;
        if !self.relation_exists_sync(&conn, self.schema(), &self.options.lock_table)? {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {} WHERE lock_key = ? AND holder = ?",
            self.qualified(&self.options.lock_table)
        );
        conn.execute(&sql, duckdb::params![handle.key(), handle.holder()])
            .map_err(|e| DbError::LockError(format!("failed to release lock: {e}")))?;
        Ok(())
    }

    fn force_release_sync(&self) -> DbResult<()> {
        let conn = self.connection()?;
        if !self.relation_exists_sync(&conn, self.schema(), &self.options.lock_table)? {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {} WHERE lock_key = ?",
            self.qualified(&self.options.lock_table)
        );
        conn.execute(&sql, duckdb::params![self.lock_key()])
            .map_err(|e| DbError::LockError(format!("failed to clear lock: {e}")))?;
        Ok(())
    }
}

/// Whether a DuckDB error means another client holds or is taking the lock.
///
/// duckdb::Error has no structured variant for either case, so both the
/// primary key violation and the transaction conflict are recognised by
/// message.
fn is_lock_contention(msg: &str) -> bool {
    msg.contains("Duplicate key")
        || msg.contains("Constraint Error")
        || msg.contains("write-write conflict")
        || (msg.contains("TransactionContext Error") && msg.contains("onflict"))
}

#[async_trait]
impl Driver for DuckDbBackend {
    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    async fn execute(&self, statements: &[String], within_transaction: bool) -> DbResult<()> {
        self.execute_sync(statements, within_transaction)
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        let conn = self.connection()?;

        // Handle schema-qualified names
        let (schema, table) = match name.rfind('.') {
            Some(pos) => (&name[..pos], &name[pos + 1..]),
            None => (self.schema(), name),
        };
        self.relation_exists_sync(&conn, schema, table)
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[async_trait]
impl VersionStore for DuckDbBackend {
    async fn read(&self) -> DbResult<VersionRecord> {
        self.read_sync()
    }

    async fn write(&self, record: VersionRecord) -> DbResult<()> {
        self.write_sync(record)
    }
}

#[async_trait]
impl Locker for DuckDbBackend {
    async fn acquire(&self) -> DbResult<LockHandle> {
        self.acquire_sync()
    }

    async fn release(&self, handle: &LockHandle) -> DbResult<()> {
        self.release_sync(handle)
    }

    async fn force_release(&self) -> DbResult<()> {
        self.force_release_sync()
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
