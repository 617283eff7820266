//! Version command implementation

use anyhow::Result;

use crate::cli::GlobalArgs;
use crate::commands::common::build_migrator;

/// Execute the version command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let (_, migrator) = build_migrator(global).await?;
    let record = migrator.current_version().await?;
    println!("Schema version: {record}.");
    Ok(())
}
