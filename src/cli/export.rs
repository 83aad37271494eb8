use std::path::PathBuf;

use crate::cli::open;
use crate::error::Result;
use crate::exporter::{export_sage, DEFAULT_EXPORT_FILE};
use crate::pipeline::StageStatus;

pub fn run(workspace: Option<&str>, output: Option<String>) -> Result<()> {
    let (ws, _, mut store) = open(workspace)?;
    let output = match output {
        Some(p) => PathBuf::from(p),
        None => ws.export_path(DEFAULT_EXPORT_FILE)?,
    };

    let report = export_sage(&mut store, &output)?;
    if report.status == StageStatus::NoInput {
        println!("No coded bank records to export.");
        return Ok(());
    }
    println!("Exported {} record(s) to {}", report.exported, output.display());
    Ok(())
}
