//! Error types for keel-core

use thiserror::Error;

use crate::version::SchemaVersion;

/// Core error type for Keel
#[derive(Error, Debug)]
pub enum CoreError {
    /// K001: Configuration file not found
    #[error("[K001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// K002: Failed to parse configuration file
    #[error("[K002] Failed to parse config")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// K003: Invalid configuration value
    #[error("[K003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// K004: Database URL could not be interpreted
    #[error("[K004] Invalid database URL '{url}': {reason}")]
    InvalidDatabaseUrl { url: String, reason: String },

    /// K005: Migration directory does not exist
    #[error("[K005] Migration source not found: {path}")]
    SourceNotFound { path: String },

    /// K006: Two migration units claim the same version
    #[error("[K006] Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: SchemaVersion,
        first: String,
        second: String,
    },

    /// K007: Migration unit is missing, unreadable or invalid
    #[error("[K007] Malformed migration '{location}': {reason}")]
    MalformedUnit { location: String, reason: String },

    /// K008: Versions are required to be contiguous but a version is missing
    #[error("[K008] Migration version gap: expected version {expected}, found {found}")]
    VersionGap {
        expected: SchemaVersion,
        found: SchemaVersion,
    },

    /// K009: IO error with file path context
    #[error("[K009] Failed to read '{path}'")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
