//! Steps command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, StepsArgs};
use crate::commands::common::{build_migrator, print_outcome};

/// Execute the steps command
pub async fn execute(args: &StepsArgs, global: &GlobalArgs) -> Result<()> {
    let (_, migrator) = build_migrator(global).await?;
    let outcome = migrator.steps(args.n).await?;
    print_outcome(&outcome);
    Ok(())
}
