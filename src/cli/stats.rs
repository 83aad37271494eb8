use comfy_table::{Cell, Table};

use crate::cli::open;
use crate::error::Result;
use crate::fmt::{format_bytes, percent};
use crate::reports::{get_recent_stages, get_stats};

pub fn run(workspace: Option<&str>) -> Result<()> {
    let (ws, config, store) = open(workspace)?;
    let stats = get_stats(store.conn())?;

    println!("Workspace:  {}", ws.name);
    println!("Path:       {}", ws.path.display());
    println!("DB size:    {}", format_bytes(std::fs::metadata(ws.db_path())?.len()));
    println!(
        "Thresholds: auto-code {}, min rule {}",
        percent(config.default_confidence_threshold),
        percent(config.min_rule_confidence)
    );

    let r = &stats.records;
    println!();
    println!("Records:       {} ({} history, {} bank)", r.total, r.history, r.bank);
    println!("Coded:         {}", r.coded);
    println!("Reviewed:      {}", r.reviewed);
    println!("Avg confidence {}", percent(r.avg_confidence));

    let rules = &stats.rules;
    println!();
    println!("Rules:         {} ({} learned, {} manual)", rules.total, rules.learned, rules.manual);
    println!("Avg confidence {}", percent(rules.avg_confidence));
    println!("Overrides:     {}", stats.overrides);

    let runs = get_recent_stages(store.conn(), 5)?;
    if !runs.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["When", "Stage", "Action", "Result", "ms"]);
        for run in runs {
            table.add_row(vec![
                Cell::new(run.created_at),
                Cell::new(run.stage),
                Cell::new(run.action),
                Cell::new(run.output_summary),
                Cell::new(run.duration_ms),
            ]);
        }
        println!("\nRecent runs\n{table}");
    }
    Ok(())
}
