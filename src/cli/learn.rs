use crate::cli::open;
use crate::error::Result;
use crate::fmt::percent;
use crate::learner::{learn, LearnReport};
use crate::pipeline::StageStatus;

pub(crate) fn print_report(report: &LearnReport) {
    if report.status == StageStatus::NoInput {
        println!("Learn: no coded history records; nothing learned.");
        return;
    }
    println!(
        "Learn: {} history records, {} vendors, {} rules created ({} replaced), avg confidence {}",
        report.history_records,
        report.vendors_seen,
        report.rules_created,
        report.rules_replaced,
        percent(report.avg_confidence)
    );
    if report.reviewer_owned > 0 {
        println!("      {} vendor(s) kept their reviewer rule", report.reviewer_owned);
    }
}

pub fn run(workspace: Option<&str>, min_confidence: Option<f64>) -> Result<()> {
    let (ws, config, mut store) = open(workspace)?;
    let min_confidence = min_confidence.unwrap_or(config.min_rule_confidence);
    let report = learn(&mut store, min_confidence)?;
    ws.touch()?;
    print_report(&report);
    Ok(())
}
