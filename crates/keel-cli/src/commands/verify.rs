//! Verify command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, VerifyArgs};
use crate::commands::common::{build_migrator, run_verification};

/// Execute the verify command
pub async fn execute(args: &VerifyArgs, global: &GlobalArgs) -> Result<()> {
    let (config, migrator) = build_migrator(global).await?;
    let names = if args.relations.is_empty() {
        &config.verify.relations
    } else {
        &args.relations
    };
    run_verification(&migrator, names).await
}
