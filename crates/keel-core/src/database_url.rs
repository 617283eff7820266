//! Database connection strings
//!
//! Keel takes a URL-form DSN and only looks inside it far enough to pick a
//! backend and to name the database for locking and logging. The raw string
//! is handed to the driver untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

use crate::error::{CoreError, CoreResult};

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// PostgreSQL (`postgres://`, `postgresql://`)
    Postgres,
    /// DuckDB (`duckdb:///path/to/file.db`, `duckdb::memory:`)
    DuckDb,
}

impl DbType {
    /// Dialect name understood by `keel_sql::dialect_from_name`.
    pub fn dialect_name(self) -> &'static str {
        match self {
            DbType::Postgres => "postgres",
            DbType::DuckDb => "duckdb",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect_name())
    }
}

/// PostgreSQL `sslmode` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(TlsMode::Disable),
            "allow" => Ok(TlsMode::Allow),
            "prefer" => Ok(TlsMode::Prefer),
            "require" => Ok(TlsMode::Require),
            "verify-ca" => Ok(TlsMode::VerifyCa),
            "verify-full" => Ok(TlsMode::VerifyFull),
            other => Err(format!("unknown sslmode '{other}'")),
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TlsMode::Disable => "disable",
            TlsMode::Allow => "allow",
            TlsMode::Prefer => "prefer",
            TlsMode::Require => "require",
            TlsMode::VerifyCa => "verify-ca",
            TlsMode::VerifyFull => "verify-full",
        };
        f.write_str(s)
    }
}

/// What a database URL points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Postgres {
        host: String,
        database: String,
        tls: TlsMode,
    },
    /// `path` is `None` for an in-memory database
    DuckDb { path: Option<PathBuf> },
}

/// A parsed database URL.
///
/// `Display` and `Debug` never show the password.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseUrl {
    raw: String,
    redacted: String,
    target: DatabaseTarget,
}

impl DatabaseUrl {
    /// Parse and classify a DSN.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|e| CoreError::InvalidDatabaseUrl {
            url: redact_unparsed(raw),
            reason: e.to_string(),
        })?;
        let redacted = redact(&url);
        let invalid = |reason: String| CoreError::InvalidDatabaseUrl {
            url: redacted.clone(),
            reason,
        };

        let target = match url.scheme() {
            "postgres" | "postgresql" => {
                let host = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .unwrap_or("localhost")
                    .to_string();
                let database = url.path().trim_start_matches('/').to_string();
                if database.is_empty() {
                    return Err(invalid("missing database name".to_string()));
                }
                let tls = match url.query_pairs().find(|(k, _)| k == "sslmode") {
                    Some((_, mode)) => mode.parse::<TlsMode>().map_err(invalid)?,
                    None => TlsMode::Prefer,
                };
                DatabaseTarget::Postgres {
                    host,
                    database,
                    tls,
                }
            }
            "duckdb" => {
                let path = url.path();
                let path = if path.is_empty() || path == ":memory:" {
                    None
                } else {
                    Some(PathBuf::from(path))
                };
                DatabaseTarget::DuckDb { path }
            }
            other => return Err(invalid(format!("unsupported scheme '{other}'"))),
        };

        Ok(Self {
            raw: raw.to_string(),
            redacted,
            target,
        })
    }

    /// The DSN exactly as given, credentials included. Only for drivers.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The DSN with any password replaced by `***`.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    pub fn db_type(&self) -> DbType {
        match self.target {
            DatabaseTarget::Postgres { .. } => DbType::Postgres,
            DatabaseTarget::DuckDb { .. } => DbType::DuckDb,
        }
    }

    /// Logical database name: the PostgreSQL database, the DuckDB file path,
    /// or `memory`.
    pub fn database_name(&self) -> String {
        match &self.target {
            DatabaseTarget::Postgres { database, .. } => database.clone(),
            DatabaseTarget::DuckDb { path: Some(path) } => path.display().to_string(),
            DatabaseTarget::DuckDb { path: None } => "memory".to_string(),
        }
    }
}

impl FromStr for DatabaseUrl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

impl fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseUrl")
            .field("url", &self.redacted)
            .field("target", &self.target)
            .finish()
    }
}

fn redact(url: &Url) -> String {
    if url.password().is_none() {
        return url.to_string();
    }
    let mut masked = url.clone();
    // set_password only fails for URLs that cannot carry credentials, which
    // cannot have had a password to begin with.
    let _ = masked.set_password(Some("***"));
    masked.to_string()
}

/// Best-effort masking for strings the URL parser rejected.
fn redact_unparsed(raw: &str) -> String {
    let Some(scheme_end) = raw.find("://") else {
        return raw.to_string();
    };
    let rest = &raw[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return raw.to_string();
    };
    let userinfo = &rest[..at];
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}{user}:***{}", &raw[..scheme_end + 3], &rest[at..]),
        None => raw.to_string(),
    }
}

#[cfg(test)]
#[path = "database_url_test.rs"]
mod tests;
