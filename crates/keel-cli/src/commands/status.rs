//! Status command implementation

use anyhow::Result;
use keel_migrate::{StatusReport, UnitState};

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::commands::common::{build_migrator, print_table};

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let (_, migrator) = build_migrator(global).await?;
    let report = migrator.status().await?;

    match args.output {
        StatusOutput::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        StatusOutput::Table => print_status(&report),
    }
    Ok(())
}

fn print_status(report: &StatusReport) {
    println!("Schema version: {}.", report.current);
    if !report.current_known {
        println!(
            "Warning: version {} has no migration file.",
            report.current.version
        );
    }
    if report.units.is_empty() {
        println!("No migrations found.");
        return;
    }
    println!();

    let rows: Vec<Vec<String>> = report
        .units
        .iter()
        .map(|unit| {
            vec![
                unit.version.to_string(),
                state_label(unit.state).to_string(),
                if unit.has_down { "yes" } else { "no" }.to_string(),
                unit.label.clone(),
            ]
        })
        .collect();
    print_table(&["VERSION", "STATE", "DOWN", "LABEL"], &rows);

    println!();
    println!(
        "{} applied, {} pending, latest {}",
        report.units.len() - report.pending(),
        report.pending(),
        report.latest
    );
}

fn state_label(state: UnitState) -> &'static str {
    match state {
        UnitState::Applied => "applied",
        UnitState::Dirty => "dirty",
        UnitState::Pending => "pending",
    }
}
