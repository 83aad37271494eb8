use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open;
use crate::error::Result;
use crate::fmt::{money, percent};
use crate::reviewer::{approve_record, override_record, review_queue};
use crate::suggester::{KeywordSuggester, Suggester};

pub fn list(workspace: Option<&str>, threshold: Option<f64>, suggest: bool) -> Result<()> {
    let (_, config, store) = open(workspace)?;
    let threshold = threshold.unwrap_or(config.default_confidence_threshold);
    let queue = review_queue(&store, threshold)?;
    if queue.is_empty() {
        println!("Nothing to review.");
        return Ok(());
    }

    let keywords = KeywordSuggester::default();
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Vendor", "Amount", "Code", "Confidence", "Explanation"]);
    for record in &queue {
        let code = match (&record.nominal_code, &record.suggested_code) {
            (Some(code), _) => code.clone(),
            (None, Some(guess)) => format!("{guess}?").yellow().to_string(),
            (None, None) => "-".to_string(),
        };
        let mut explanation = record.explanation.clone().unwrap_or_default();
        if suggest {
            let hints: Vec<String> = keywords
                .suggest(record)
                .iter()
                .map(|s| format!("{} {} ({})", s.nominal_code, s.reason, percent(s.confidence)))
                .collect();
            if !hints.is_empty() {
                explanation = format!("{explanation}\n{}", hints.join("\n"));
            }
        }
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(record.date),
            Cell::new(&record.vendor),
            Cell::new(money(record.amount.value())),
            Cell::new(code),
            Cell::new(record.confidence.map(|c| percent(c.value())).unwrap_or_default()),
            Cell::new(explanation),
        ]);
    }
    println!("Needs review ({})\n{table}", queue.len());
    println!("Use `nominal approve <id>` or `nominal override <id> <code>`.");
    Ok(())
}

pub fn approve(workspace: Option<&str>, id: i64) -> Result<()> {
    let (ws, _, mut store) = open(workspace)?;
    let code = approve_record(&mut store, id)?;
    ws.touch()?;
    println!("Approved record {id} as {}", code.green());
    Ok(())
}

pub fn override_code(workspace: Option<&str>, id: i64, code: &str, no_rule: bool) -> Result<()> {
    let (ws, _, mut store) = open(workspace)?;
    let rule_id = override_record(&mut store, id, code, !no_rule)?;
    ws.touch()?;
    println!("Record {id} coded as {}", code.trim().green());
    if let Some(rule_id) = rule_id {
        println!("Created rule {rule_id}; future records from this vendor will use it.");
    }
    Ok(())
}
