use colored::Colorize;

use crate::classifier::{classify, ClassifyReport};
use crate::cli::open;
use crate::error::Result;
use crate::fmt::percent;
use crate::pipeline::StageStatus;
use crate::suggester::{KeywordSuggester, Suggester};

pub(crate) fn print_report(report: &ClassifyReport) {
    if report.status == StageStatus::NoInput {
        println!("Classify: no uncoded bank records.");
        return;
    }
    let exceptions = if report.exceptions > 0 {
        format!("{} need review", report.exceptions).yellow().to_string()
    } else {
        "0 need review".to_string()
    };
    println!(
        "Classify: {}/{} auto-coded, {exceptions}, avg confidence {}",
        report.auto_coded.to_string().green(),
        report.processed,
        percent(report.avg_confidence)
    );
    if report.skipped > 0 {
        println!("          {} record(s) skipped", report.skipped);
    }
}

pub fn run(workspace: Option<&str>, threshold: Option<f64>, suggest: bool) -> Result<()> {
    let (ws, config, mut store) = open(workspace)?;
    let threshold = threshold.unwrap_or(config.default_confidence_threshold);
    let keywords = KeywordSuggester::default();
    let suggester = suggest.then_some(&keywords as &dyn Suggester);
    let report = classify(&mut store, threshold, suggester)?;
    ws.touch()?;
    print_report(&report);
    Ok(())
}
