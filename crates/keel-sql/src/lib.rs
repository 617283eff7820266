//! keel-sql - SQL layer for Keel
//!
//! This crate tokenizes migration payloads with sqlparser-rs and splits them
//! into individually executable statements, so a failing statement can be
//! reported by its position within the migration.

pub mod dialect;
pub mod error;
pub mod splitter;

pub use dialect::{dialect_from_name, DuckDbDialect, GenericDialect, PostgresDialect, SqlDialect};
pub use error::{SqlError, SqlResult};
pub use splitter::split_statements;
