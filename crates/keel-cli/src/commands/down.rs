//! Down command implementation

use anyhow::Result;
use keel_core::SchemaVersion;

use crate::cli::{DownArgs, GlobalArgs};
use crate::commands::common::{build_migrator, print_outcome};

/// Execute the down command
pub async fn execute(args: &DownArgs, global: &GlobalArgs) -> Result<()> {
    let (_, migrator) = build_migrator(global).await?;

    let outcome = match (args.all, args.to) {
        (true, _) => migrator.down(SchemaVersion::NONE).await?,
        (false, Some(to)) => migrator.down(to).await?,
        (false, None) => migrator.steps(-1).await?,
    };
    print_outcome(&outcome);
    Ok(())
}
