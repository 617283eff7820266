//! keel-db - Database layer for Keel
//!
//! This crate provides the three capabilities the migration engine needs
//! from a target database: the [`Driver`] that executes statements, the
//! [`VersionStore`] that persists the applied version and dirty flag, and the
//! [`Locker`] that keeps concurrent migration runs apart. DuckDB and
//! PostgreSQL implement all three.

pub mod connect;
pub mod duckdb;
pub mod error;
pub mod postgres;
pub mod traits;

pub use connect::{connect, Backend, StoreOptions};
pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use postgres::PostgresBackend;
pub use traits::{Driver, LockHandle, Locker, VersionStore};
