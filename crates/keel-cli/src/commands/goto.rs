//! Goto command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, GotoArgs};
use crate::commands::common::{build_migrator, print_outcome};

/// Execute the goto command
pub async fn execute(args: &GotoArgs, global: &GlobalArgs) -> Result<()> {
    let (_, migrator) = build_migrator(global).await?;
    let outcome = migrator.goto(args.version).await?;
    print_outcome(&outcome);
    Ok(())
}
