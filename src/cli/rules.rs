use comfy_table::{Cell, Table};

use crate::cli::open;
use crate::error::{NominalError, Result};
use crate::fmt::percent;
use crate::reviewer::add_manual_rule;
use crate::store::Store;

pub fn list(workspace: Option<&str>, min_confidence: Option<f64>) -> Result<()> {
    let (_, _, store) = open(workspace)?;
    let rules = store.list_rules(min_confidence)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Code", "Type", "Confidence", "Matches", "By", "Last used"]);
    for rule in &rules {
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(&rule.vendor_pattern),
            Cell::new(&rule.nominal_code),
            Cell::new(rule.rule_type.as_str()),
            Cell::new(percent(rule.confidence.value())),
            Cell::new(rule.match_count),
            Cell::new(rule.created_by.as_str()),
            Cell::new(
                rule.last_used
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }
    println!("Rules ({})\n{table}", rules.len());
    Ok(())
}

pub fn add(workspace: Option<&str>, pattern: &str, code: &str) -> Result<()> {
    let (ws, _, mut store) = open(workspace)?;
    let id = add_manual_rule(&mut store, pattern, code)?;
    ws.touch()?;
    println!("Added rule {id}: '{}' \u{2192} {code}", pattern.trim());
    Ok(())
}

pub fn delete(workspace: Option<&str>, id: i64) -> Result<()> {
    let (ws, _, mut store) = open(workspace)?;
    if !store.delete_rule(id)? {
        return Err(NominalError::UnknownRule(id));
    }
    ws.touch()?;
    println!("Deleted rule {id}");
    Ok(())
}
