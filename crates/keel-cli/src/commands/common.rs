//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use keel_core::{Config, DirectorySource};
use keel_db::{connect, StoreOptions};
use keel_migrate::{MigrationOutcome, Migrator, MigratorConfig};
use keel_sql::dialect_from_name;
use std::fmt;
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Intentionally empty: ExitCode is a control-flow mechanism, not a
        // user-facing error.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Resolve configuration: keel.yml, then environment, then CLI flags.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<Config> {
    load_config_with_env(global, |key| std::env::var(key).ok())
}

pub(crate) fn load_config_with_env<F>(global: &GlobalArgs, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &global.config {
        Some(path) => Config::load(path),
        None => Config::load_from_dir(&global.project_dir),
    }
    .context("Failed to load configuration")?;

    config.apply_env(lookup);
    if let Some(url) = &global.database_url {
        config.database.url = Some(url.clone());
    }
    if let Some(dir) = &global.migrations_dir {
        config.migrations_dir = dir.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Connect to the configured database and set up the engine.
pub(crate) async fn build_migrator(global: &GlobalArgs) -> Result<(Config, Migrator)> {
    let config = load_config(global)?;
    let migrator = migrator_for(&config, global).await?;
    Ok((config, migrator))
}

pub(crate) async fn migrator_for(config: &Config, global: &GlobalArgs) -> Result<Migrator> {
    let url = config.database_url()?;
    log::debug!("Connecting to {url}");
    let backend = connect(&url, StoreOptions::from(&config.database))
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;

    let dialect = dialect_from_name(url.db_type().dialect_name())?;
    let source = DirectorySource::new(config.migrations_path(&global.project_dir))
        .with_dialect(dialect)
        .require_contiguous(config.require_contiguous);

    let settings = MigratorConfig::from_config(config).allow_production(global.allow_prod);
    Ok(Migrator::new(backend, Arc::new(source), settings))
}

/// Print the before/after lines for a schema-changing command.
pub(crate) fn print_outcome(outcome: &MigrationOutcome) {
    match outcome {
        MigrationOutcome::Deferred { version } => {
            println!("Prod environment. Migration is run before deployment.");
            println!("Schema version: {version}.");
        }
        MigrationOutcome::NoChange { version } => {
            println!("Schema version before migration: {version}.");
            println!("No migration. Schema is already latest: {version}.");
        }
        MigrationOutcome::Migrated { from, to, applied } => {
            println!("Schema version before migration: {from}.");
            println!("Schema version after migration: {to}.");
            log::debug!("Applied {} migration(s)", applied.len());
        }
    }
}

/// Check `names` and print one line per relation; fail if any is missing.
pub(crate) async fn run_verification(migrator: &Migrator, names: &[String]) -> Result<()> {
    if names.is_empty() {
        println!("Nothing to verify.");
        return Ok(());
    }

    let report = migrator.verify(names).await?;
    for check in &report.checks {
        if check.exists {
            println!(
                "SUCCESS! Migration applied. Table {} created.",
                check.name
            );
        } else {
            eprintln!(
                "FAIL! Migration hasn't been applied. Table {} not created.",
                check.name
            );
        }
    }

    if report.all_present() {
        Ok(())
    } else {
        Err(ExitCode(1).into())
    }
}

/// Column widths: the widest of the header and every cell, per column.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);
    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        println!("{}", line(row.clone()));
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
