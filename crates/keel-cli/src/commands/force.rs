//! Force command implementation

use anyhow::Result;

use crate::cli::{ForceArgs, GlobalArgs};
use crate::commands::common::build_migrator;

/// Execute the force command
pub async fn execute(args: &ForceArgs, global: &GlobalArgs) -> Result<()> {
    let (_, migrator) = build_migrator(global).await?;
    let before = migrator.current_version().await?;
    let after = migrator.force(args.version).await?;
    println!("Schema version forced from {before} to {after}.");
    Ok(())
}
