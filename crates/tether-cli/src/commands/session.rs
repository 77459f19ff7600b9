use std::path::Path;

use crate::commands::common::{format_report_lines, open_engine};
use crate::error::CliError;

/// Record a connectivity change, then print the pass it triggered.
pub async fn run_connectivity(connected: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path, None).await?;
    let report = engine.handle_connectivity(connected).await;

    println!("{}", if connected { "Online" } else { "Offline" });
    for line in format_report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_check(db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path, None).await?;
    let report = engine.run_pass().await;

    for line in format_report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}
