//! Keel CLI - apply versioned schema migrations and verify the result

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::Cli;
use commands::common::ExitCode;
use commands::{down, force, goto, status, steps, unlock, up, verify, version};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match dotenvy::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Ignoring .env file: {e}"),
    }

    if let Err(err) = run(&cli).await {
        if let Some(ExitCode(code)) = err.downcast_ref::<ExitCode>() {
            std::process::exit(*code);
        }
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        cli::Commands::Up(args) => up::execute(args, &cli.global).await,
        cli::Commands::Down(args) => down::execute(args, &cli.global).await,
        cli::Commands::Goto(args) => goto::execute(args, &cli.global).await,
        cli::Commands::Steps(args) => steps::execute(args, &cli.global).await,
        cli::Commands::Version => version::execute(&cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global).await,
        cli::Commands::Force(args) => force::execute(args, &cli.global).await,
        cli::Commands::Unlock => unlock::execute(&cli.global).await,
        cli::Commands::Verify(args) => verify::execute(args, &cli.global).await,
    }
}

/// Log to stderr, honoring `RUST_LOG`; `--verbose` raises the default to debug.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}
