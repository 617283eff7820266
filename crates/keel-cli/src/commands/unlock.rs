//! Unlock command implementation

use anyhow::Result;

use crate::cli::GlobalArgs;
use crate::commands::common::build_migrator;

/// Execute the unlock command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let (_, migrator) = build_migrator(global).await?;
    migrator.unlock().await?;
    println!("Migration lock cleared.");
    Ok(())
}
