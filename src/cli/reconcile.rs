use crate::cli::open;
use crate::error::Result;
use crate::pipeline::StageStatus;
use crate::reconciler::{reconcile, ReconcileReport};

pub(crate) fn print_report(report: &ReconcileReport) {
    if report.status == StageStatus::NoInput {
        println!("Reconcile: needs coded history and uncoded bank records; nothing matched.");
        return;
    }
    println!(
        "Reconcile: {}/{} bank records matched history ({} candidate pairs), {} rules created ({} replaced)",
        report.matched_records,
        report.bank_records,
        report.candidate_pairs,
        report.rules_created,
        report.rules_replaced
    );
}

pub fn run(workspace: Option<&str>, min_confidence: Option<f64>) -> Result<()> {
    let (ws, config, mut store) = open(workspace)?;
    let min_confidence = min_confidence.unwrap_or(config.min_rule_confidence);
    let report = reconcile(&mut store, min_confidence)?;
    ws.touch()?;
    print_report(&report);
    Ok(())
}
