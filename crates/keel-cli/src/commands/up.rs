//! Up command implementation

use anyhow::Result;

use crate::cli::{GlobalArgs, UpArgs};
use crate::commands::common::{build_migrator, print_outcome, run_verification};

/// Execute the up command
pub async fn execute(args: &UpArgs, global: &GlobalArgs) -> Result<()> {
    let (config, migrator) = build_migrator(global).await?;

    if !migrator.config().defers() {
        log::info!("Non prod environment. Run migration directly.");
    }
    let outcome = migrator.up(args.to).await?;
    print_outcome(&outcome);

    // Verification runs even when a production target deferred the migration
    if let Some(names) = args.relations(&config.verify.relations) {
        run_verification(&migrator, names).await?;
    }
    Ok(())
}
