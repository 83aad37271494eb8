use std::time::Instant;

use tracing::info;

use crate::classifier::{classify, ClassifyReport};
use crate::error::Result;
use crate::learner::{learn, LearnReport};
use crate::reconciler::{reconcile, ReconcileReport};
use crate::store::Store;
use crate::suggester::Suggester;

/// How a stage finished. Empty input is a result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Complete,
    NoInput,
}

pub(crate) fn elapsed_ms(start: Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}

pub struct PipelineReport {
    pub learn: LearnReport,
    pub reconcile: ReconcileReport,
    pub classify: ClassifyReport,
}

/// Learn, reconcile, then classify. Each stage reads what the previous one
/// left in the store.
pub fn process<S: Store>(
    store: &mut S,
    min_rule_confidence: f64,
    confidence_threshold: f64,
    suggester: Option<&dyn Suggester>,
) -> Result<PipelineReport> {
    let learn = learn(store, min_rule_confidence)?;
    let reconcile = reconcile(store, min_rule_confidence)?;
    let classify = classify(store, confidence_threshold, suggester)?;
    info!(
        "Pipeline done: {} + {} rules, {} auto-coded, {} exceptions",
        learn.rules_created, reconcile.rules_created, classify.auto_coded, classify.exceptions
    );
    Ok(PipelineReport {
        learn,
        reconcile,
        classify,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Amount, NewRecord, Source};
    use crate::store::{MemoryStore, RecordFilter};

    #[test]
    fn test_acme_scenario() {
        let mut store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let amount = Amount::from_cents(10000).unwrap();
        for code in ["7100", "7100", "7100", "5000"] {
            let rec = NewRecord::new(date, "ACME LTD", amount, Source::History)
                .unwrap()
                .with_code(Some(code));
            store.insert_record(&rec).unwrap();
        }
        let bank_id = store
            .insert_record(&NewRecord::new(date, "ACME LTD TXN#55", amount, Source::Bank).unwrap())
            .unwrap();

        let report = process(&mut store, 0.75, 0.70, None).unwrap();
        assert_eq!(report.learn.rules_created, 1);
        assert_eq!(report.reconcile.rules_created, 1);
        assert_eq!(report.classify.auto_coded, 1);
        assert_eq!(report.classify.exceptions, 0);

        let rec = store.get_record(bank_id).unwrap().unwrap();
        assert_eq!(rec.nominal_code.as_deref(), Some("7100"));
        assert_eq!(rec.confidence.unwrap().value(), 0.75);
        assert!(store
            .list_records(&RecordFilter::source(Source::Bank).labeled(false))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_workspace() {
        let mut store = MemoryStore::new();
        let report = process(&mut store, 0.75, 0.70, None).unwrap();
        assert_eq!(report.learn.status, StageStatus::NoInput);
        assert_eq!(report.reconcile.status, StageStatus::NoInput);
        assert_eq!(report.classify.status, StageStatus::NoInput);
    }
}
