//! keel-core - Core library for Keel
//!
//! This crate provides the migration data model (versions, units, version
//! records), the migration source abstraction with its filesystem loader,
//! database URL parsing, and project configuration shared by all Keel
//! components.

pub mod config;
pub mod database_url;
pub mod error;
pub mod source;
pub mod unit;
pub mod version;

pub use config::{Config, DatabaseConfig, VerifyConfig};
pub use database_url::{DatabaseTarget, DatabaseUrl, DbType, TlsMode};
pub use error::{CoreError, CoreResult};
pub use source::{DirectorySource, MigrationSet, MigrationSource, StaticSource};
pub use unit::{Direction, MigrationUnit};
pub use version::{SchemaVersion, VersionRecord};
