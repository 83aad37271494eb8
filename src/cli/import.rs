use std::path::PathBuf;

use crate::cli::{open, SourceArg};
use crate::error::{NominalError, Result};
use crate::importer::import_file;
use crate::models::Source;

pub fn run(workspace: Option<&str>, source: SourceArg, file: &str) -> Result<()> {
    let file_path = PathBuf::from(file);
    if !file_path.is_file() {
        return Err(NominalError::Other(format!("File not found: {file}")));
    }
    let source = Source::from(source);
    let (ws, _, mut store) = open(workspace)?;

    let result = import_file(&mut store, &file_path, source)?;
    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    // Keep a copy of what was loaded alongside the workspace.
    if let Some(name) = file_path.file_name() {
        std::fs::copy(&file_path, ws.imports_dir().join(name))?;
    }
    ws.touch()?;
    println!(
        "{} {source} record(s) imported, {} row(s) skipped",
        result.imported, result.skipped
    );
    Ok(())
}
