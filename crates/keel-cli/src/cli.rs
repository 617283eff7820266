//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use keel_core::SchemaVersion;
use std::path::PathBuf;

/// Keel - apply versioned schema migrations and verify the result
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override database URL
    #[arg(short = 'd', long, global = true)]
    pub database_url: Option<String>,

    /// Override migrations directory
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<String>,

    /// Migrate even when the target is marked as production
    #[arg(long, global = true)]
    pub allow_prod: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Up(UpArgs),

    /// Revert applied migrations
    Down(DownArgs),

    /// Migrate up or down to a version
    Goto(GotoArgs),

    /// Apply (positive) or revert (negative) a number of migrations
    Steps(StepsArgs),

    /// Print the current schema version
    Version,

    /// List migrations with their applied state
    Status(StatusArgs),

    /// Record a version as applied without running migrations
    Force(ForceArgs),

    /// Clear a migration lock left by a crashed run
    Unlock,

    /// Check that tables or views exist
    Verify(VerifyArgs),
}

/// Arguments for the up command
#[derive(Args, Debug, Default)]
pub struct UpArgs {
    /// Stop after this version
    #[arg(long)]
    pub to: Option<SchemaVersion>,

    /// Relations to verify afterwards instead of verify.relations (comma-separated)
    #[arg(long, num_args = 0.., value_delimiter = ',', conflicts_with = "no_verify")]
    pub verify: Option<Vec<String>>,

    /// Skip the relation check that follows every up
    #[arg(long)]
    pub no_verify: bool,
}

impl UpArgs {
    /// Relations to check after migrating: `--verify` names, else the
    /// configured ones. `None` when there is nothing to check.
    pub fn relations<'a>(&'a self, configured: &'a [String]) -> Option<&'a [String]> {
        if self.no_verify {
            return None;
        }
        match &self.verify {
            Some(names) if !names.is_empty() => Some(names.as_slice()),
            Some(_) => Some(configured),
            None if configured.is_empty() => None,
            None => Some(configured),
        }
    }
}

/// Arguments for the down command
#[derive(Args, Debug, Default)]
pub struct DownArgs {
    /// Revert down to this version (default: revert the last migration)
    #[arg(long, conflicts_with = "all")]
    pub to: Option<SchemaVersion>,

    /// Revert every applied migration
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the goto command
#[derive(Args, Debug)]
pub struct GotoArgs {
    /// Target version
    pub version: SchemaVersion,
}

/// Arguments for the steps command
#[derive(Args, Debug)]
pub struct StepsArgs {
    /// Number of migrations; negative reverts
    #[arg(allow_negative_numbers = true)]
    pub n: i64,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: StatusOutput,
}

/// Status output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

/// Arguments for the force command
#[derive(Args, Debug)]
pub struct ForceArgs {
    /// Version to record as cleanly applied (0 clears the record)
    pub version: SchemaVersion,
}

/// Arguments for the verify command
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Relations to check (default: verify.relations from keel.yml)
    pub relations: Vec<String>,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
