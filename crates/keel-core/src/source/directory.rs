//! Filesystem migration source
//!
//! Migrations live in a single directory as pairs of files named
//! `{version}_{label}.up.{ext}` and `{version}_{label}.down.{ext}`. The down
//! file is optional. The label may contain dots and the extension may be
//! compound (`3_more.up.pg.sql`). A file whose name contains `.up.` or
//! `.down.` but does not follow this layout is an error. Other files are
//! ignored.

use keel_sql::{split_statements, GenericDialect, SqlDialect};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{MigrationSet, MigrationSource};
use crate::error::{CoreError, CoreResult};
use crate::unit::{Direction, MigrationUnit};
use crate::version::SchemaVersion;

/// First-line marker that keeps a unit out of a transaction.
pub const NO_TRANSACTION_DIRECTIVE: &str = "-- keel:no-transaction";

static MIGRATION_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<version>[0-9]+)(?:_(?P<label>.*))?\.(?P<direction>up|down)\.(?P<ext>.+)$")
        .expect("migration file pattern is valid")
});

/// A migration file after name parsing and statement splitting.
struct ParsedFile {
    path: PathBuf,
    version: SchemaVersion,
    label: String,
    direction: Direction,
    statements: Vec<String>,
    transactional: bool,
}

#[derive(Default)]
struct PendingUnit {
    up: Option<ParsedFile>,
    down: Option<ParsedFile>,
}

/// Loads migration units from a directory
pub struct DirectorySource {
    dir: PathBuf,
    dialect: Box<dyn SqlDialect>,
    require_contiguous: bool,
}

impl DirectorySource {
    /// Source over `dir`, tokenizing with the generic dialect.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dialect: Box::new(GenericDialect::new()),
            require_contiguous: false,
        }
    }

    /// Tokenize payloads with the target database's dialect.
    pub fn with_dialect(mut self, dialect: Box<dyn SqlDialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Reject sources whose versions are not exactly `1..=n`.
    pub fn require_contiguous(mut self, require: bool) -> Self {
        self.require_contiguous = require;
        self
    }

    /// The directory this source reads.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn parse_file(&self, path: &Path, name: &str) -> CoreResult<Option<ParsedFile>> {
        let Some(caps) = MIGRATION_FILE.captures(name) else {
            if looks_like_migration(name) {
                return Err(malformed(
                    path,
                    "expected {version}_{label}.up.{ext} or {version}_{label}.down.{ext}",
                ));
            }
            log::debug!("Ignoring non-migration file {}", path.display());
            return Ok(None);
        };

        let direction = if &caps["direction"] == "up" {
            Direction::Up
        } else {
            Direction::Down
        };

        let label = caps.name("label").map_or("", |m| m.as_str());
        let version = match caps["version"].parse::<SchemaVersion>() {
            Ok(v) if !v.is_none() => v,
            Ok(_) => {
                return Err(malformed(
                    path,
                    "version 0 is reserved for the unmigrated state",
                ))
            }
            Err(e) => return Err(malformed(path, &e)),
        };

        let content = std::fs::read_to_string(path)
            .map_err(|e| malformed(path, &format!("unreadable: {e}")))?;

        let transactional = !has_no_transaction_directive(&content);
        let statements = split_statements(self.dialect.as_ref(), &content)
            .map_err(|e| malformed(path, &e.to_string()))?;

        if direction == Direction::Up && statements.is_empty() {
            return Err(malformed(path, "up migration contains no statements"));
        }

        Ok(Some(ParsedFile {
            path: path.to_path_buf(),
            version,
            label: label.to_string(),
            direction,
            statements,
            transactional,
        }))
    }

    fn collect_files(&self) -> CoreResult<BTreeMap<SchemaVersion, PendingUnit>> {
        if !self.dir.is_dir() {
            return Err(CoreError::SourceNotFound {
                path: self.dir.display().to_string(),
            });
        }

        let io_err = |source: std::io::Error| CoreError::IoWithPath {
            path: self.dir.display().to_string(),
            source,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            entries.push(entry.map_err(io_err)?.path());
        }
        // Stable error reporting regardless of directory iteration order.
        entries.sort();

        let mut pending: BTreeMap<SchemaVersion, PendingUnit> = BTreeMap::new();
        for path in entries {
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                log::debug!("Ignoring non UTF-8 file name {}", path.display());
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(file) = self.parse_file(&path, name)? else {
                continue;
            };

            let slot = pending.entry(file.version).or_default();
            let existing = match file.direction {
                Direction::Up => &mut slot.up,
                Direction::Down => &mut slot.down,
            };
            if let Some(first) = existing {
                return Err(CoreError::DuplicateVersion {
                    version: file.version,
                    first: file_name(&first.path),
                    second: file_name(&file.path),
                });
            }
            *existing = Some(file);
        }
        Ok(pending)
    }
}

impl MigrationSource for DirectorySource {
    fn list(&self) -> CoreResult<MigrationSet> {
        let pending = self.collect_files()?;

        let mut units = Vec::with_capacity(pending.len());
        for (version, slot) in pending {
            let Some(up) = slot.up else {
                let location = slot
                    .down
                    .map(|d| d.path.display().to_string())
                    .unwrap_or_else(|| version.to_string());
                return Err(CoreError::MalformedUnit {
                    location,
                    reason: "down migration has no matching up migration".to_string(),
                });
            };

            let mut unit = MigrationUnit::new(version, up.label.clone(), up.statements);
            if !up.transactional {
                unit = unit.non_transactional();
            }
            if let Some(down) = slot.down {
                if down.label != up.label {
                    return Err(malformed(
                        &down.path,
                        &format!(
                            "label '{}' does not match up migration label '{}'",
                            down.label, up.label
                        ),
                    ));
                }
                unit = unit.with_down(down.statements);
            }
            units.push(unit);
        }

        let set = MigrationSet::from_units(units)?;
        if self.require_contiguous {
            set.check_contiguous()?;
        }
        log::debug!(
            "Loaded {} migration(s) from {}",
            set.len(),
            self.dir.display()
        );
        Ok(set)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

fn looks_like_migration(name: &str) -> bool {
    name.contains(".up.") || name.contains(".down.")
}

fn has_no_transaction_directive(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.eq_ignore_ascii_case(NO_TRANSACTION_DIRECTIVE))
}

fn malformed(path: &Path, reason: &str) -> CoreError {
    CoreError::MalformedUnit {
        location: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
#[path = "directory_test.rs"]
mod tests;
