use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::settings::{get_data_dir, load_settings, save_settings};
use crate::workspace::{delete_workspace, list_workspaces, Workspace};

fn set_active(name: Option<&str>) -> Result<()> {
    let mut settings = load_settings();
    settings.active_workspace = name.map(str::to_string);
    save_settings(&settings)
}

pub fn create(name: &str) -> Result<()> {
    let ws = Workspace::create(&get_data_dir(), name)?;
    set_active(Some(&ws.name))?;
    println!("Created workspace {} at {}", ws.name.bold(), ws.path.display());
    println!("Active workspace: {}", ws.name);
    Ok(())
}

pub fn list() -> Result<()> {
    let workspaces = list_workspaces(&get_data_dir())?;
    if workspaces.is_empty() {
        println!("No workspaces. Run `nominal workspace create <name>`.");
        return Ok(());
    }
    let active = load_settings().active_workspace;

    let mut table = Table::new();
    table.set_header(vec!["", "Name", "Created", "Last modified", "Threshold"]);
    for ws in workspaces {
        let config = ws.config()?;
        let marker = if active.as_deref() == Some(ws.name.as_str()) { "*" } else { "" };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&ws.name),
            Cell::new(config.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(config.last_modified.format("%Y-%m-%d %H:%M")),
            Cell::new(format!("{:.2}", config.default_confidence_threshold)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn delete(name: &str) -> Result<()> {
    delete_workspace(&get_data_dir(), name)?;
    if load_settings().active_workspace.as_deref() == Some(name) {
        set_active(None)?;
    }
    println!("Deleted workspace {name}");
    Ok(())
}

pub fn use_workspace(name: &str) -> Result<()> {
    let ws = Workspace::open(&get_data_dir(), name)?;
    set_active(Some(&ws.name))?;
    println!("Active workspace: {}", ws.name.bold());
    Ok(())
}
