use crate::cli::{classify, learn, open, reconcile};
use crate::error::Result;
use crate::pipeline::process;
use crate::suggester::{KeywordSuggester, Suggester};

pub fn run(
    workspace: Option<&str>,
    min_confidence: Option<f64>,
    threshold: Option<f64>,
    suggest: bool,
) -> Result<()> {
    let (ws, config, mut store) = open(workspace)?;
    let min_confidence = min_confidence.unwrap_or(config.min_rule_confidence);
    let threshold = threshold.unwrap_or(config.default_confidence_threshold);
    let keywords = KeywordSuggester::default();
    let suggester = suggest.then_some(&keywords as &dyn Suggester);

    let report = process(&mut store, min_confidence, threshold, suggester)?;
    ws.touch()?;
    learn::print_report(&report.learn);
    reconcile::print_report(&report.reconcile);
    classify::print_report(&report.classify);
    Ok(())
}
