use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::Result;
use crate::learner::{install_rules, majority_by_vendor};
use crate::models::{Record, RuleType, Source};
use crate::pipeline::{elapsed_ms, StageStatus};
use crate::store::{RecordFilter, StageLogEntry, Store};

/// Join key shared by both feeds: the date and the amount magnitude in cents.
/// Sign is dropped because the feeds disagree on which way debits point.
type MatchKey = (NaiveDate, i64);

fn match_key(record: &Record) -> MatchKey {
    (record.date, record.amount.abs_cents())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub status: StageStatus,
    pub bank_records: usize,
    pub matched_records: usize,
    pub candidate_pairs: usize,
    pub vendors_seen: usize,
    pub rules_created: usize,
    pub rules_replaced: usize,
    pub reviewer_owned: usize,
}

impl ReconcileReport {
    fn empty(status: StageStatus, bank_records: usize) -> Self {
        Self {
            status,
            bank_records,
            matched_records: 0,
            candidate_pairs: 0,
            vendors_seen: 0,
            rules_created: 0,
            rules_replaced: 0,
            reviewer_owned: 0,
        }
    }
}

/// Pair each uncoded bank record with every labeled history record sharing
/// its date and amount magnitude. Returns `(bank_vendor, nominal_code)`.
///
/// Colliding keys are expected; every history record at a key contributes
/// a candidate.
pub fn candidate_pairs<'a>(history: &'a [Record], bank: &'a [Record]) -> Vec<(&'a str, &'a str)> {
    let mut by_key: HashMap<MatchKey, Vec<&str>> = HashMap::new();
    for h in history {
        if let Some(code) = h.nominal_code.as_deref() {
            by_key.entry(match_key(h)).or_default().push(code);
        }
    }

    let mut pairs = Vec::new();
    for b in bank {
        let Some(codes) = by_key.get(&match_key(b)) else {
            continue;
        };
        debug!(
            "Bank record {} '{}' matched {} history record(s)",
            b.id,
            b.vendor,
            codes.len()
        );
        pairs.extend(codes.iter().map(|code| (b.vendor.as_str(), *code)));
    }
    pairs
}

/// Learn bank-native exact rules by joining bank records to history on
/// `(date, |amount|)` and voting on the codes each bank vendor lined up with.
pub fn reconcile<S: Store>(store: &mut S, min_confidence: f64) -> Result<ReconcileReport> {
    let start = Instant::now();
    let history = store.list_records(&RecordFilter::source(Source::History).labeled(true))?;
    let bank = store.list_records(&RecordFilter::source(Source::Bank).labeled(false))?;

    if history.is_empty() || bank.is_empty() {
        info!(
            "Nothing to reconcile ({} history, {} uncoded bank records)",
            history.len(),
            bank.len()
        );
        return Ok(ReconcileReport::empty(StageStatus::NoInput, bank.len()));
    }

    let pairs = candidate_pairs(&history, &bank);
    let history_keys: HashSet<MatchKey> = history.iter().map(match_key).collect();
    let matched_records = bank
        .iter()
        .filter(|b| history_keys.contains(&match_key(b)))
        .count();

    let majorities = majority_by_vendor(pairs.iter().copied());
    let outcome = install_rules(store, &majorities, RuleType::Exact, min_confidence)?;

    store.log_stage(&StageLogEntry {
        stage: "reconciler",
        action: "match_feeds",
        input_summary: format!("history={}, bank={}", history.len(), bank.len()),
        output_summary: format!(
            "matched={matched_records}, rules_created={}",
            outcome.created
        ),
        duration_ms: elapsed_ms(start),
    })?;
    info!(
        "Reconciled {matched_records}/{} bank records, {} rules created",
        bank.len(),
        outcome.created
    );

    Ok(ReconcileReport {
        status: StageStatus::Complete,
        bank_records: bank.len(),
        matched_records,
        candidate_pairs: pairs.len(),
        vendors_seen: majorities.len(),
        rules_created: outcome.created,
        rules_replaced: outcome.replaced,
        reviewer_owned: outcome.reviewer_owned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amount, NewRecord, RuleOrigin};
    use crate::store::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn insert(store: &mut MemoryStore, d: u32, vendor: &str, cents: i64, source: Source, code: Option<&str>) -> i64 {
        let rec = NewRecord::new(day(d), vendor, Amount::from_cents(cents).unwrap(), source)
            .unwrap()
            .with_code(code);
        store.insert_record(&rec).unwrap()
    }

    #[test]
    fn test_end_to_end_acme_match() {
        let mut store = MemoryStore::new();
        for _ in 0..3 {
            insert(&mut store, 5, "ACME LTD", 10000, Source::History, Some("7100"));
        }
        insert(&mut store, 5, "ACME LTD", 10000, Source::History, Some("5000"));
        insert(&mut store, 5, "ACME LTD TXN#55", 10000, Source::Bank, None);

        let report = reconcile(&mut store, 0.75).unwrap();
        assert_eq!(report.status, StageStatus::Complete);
        assert_eq!(report.matched_records, 1);
        assert_eq!(report.candidate_pairs, 4);
        assert_eq!(report.rules_created, 1);

        let rules = store.list_rules(None).unwrap();
        assert_eq!(rules[0].vendor_pattern, "acme ltd txn#55");
        assert_eq!(rules[0].nominal_code, "7100");
        assert_eq!(rules[0].confidence.value(), 0.75);
        assert_eq!(rules[0].rule_type, RuleType::Exact);
        assert_eq!(rules[0].created_by, RuleOrigin::Learner);
    }

    #[test]
    fn test_sign_agnostic_join() {
        let mut store = MemoryStore::new();
        insert(&mut store, 5, "Costa Coffee", -1250, Source::History, Some("7400"));
        insert(&mut store, 5, "CARD PAYMENT COSTA", 1250, Source::Bank, None);

        let history = store.list_records(&RecordFilter::source(Source::History)).unwrap();
        let bank = store.list_records(&RecordFilter::source(Source::Bank)).unwrap();
        let pairs = candidate_pairs(&history, &bank);
        assert_eq!(pairs, vec![("CARD PAYMENT COSTA", "7400")]);
    }

    #[test]
    fn test_different_date_or_amount_does_not_match() {
        let mut store = MemoryStore::new();
        insert(&mut store, 5, "Costa Coffee", -1250, Source::History, Some("7400"));
        insert(&mut store, 6, "COSTA", -1250, Source::Bank, None);
        insert(&mut store, 5, "COSTA", -1251, Source::Bank, None);

        let report = reconcile(&mut store, 0.0).unwrap();
        assert_eq!(report.matched_records, 0);
        assert_eq!(report.rules_created, 0);
        assert_eq!(report.status, StageStatus::Complete);
    }

    #[test]
    fn test_collisions_all_vote() {
        let mut store = MemoryStore::new();
        insert(&mut store, 5, "Vendor A", 5000, Source::History, Some("7100"));
        insert(&mut store, 5, "Vendor B", 5000, Source::History, Some("7200"));
        insert(&mut store, 5, "BANK TEXT", 5000, Source::Bank, None);

        let report = reconcile(&mut store, 0.5).unwrap();
        assert_eq!(report.candidate_pairs, 2);
        let rules = store.list_rules(None).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].nominal_code, "7100", "tie goes to first-seen code");
        assert_eq!(rules[0].confidence.value(), 0.5);
    }

    #[test]
    fn test_votes_accumulate_across_bank_records() {
        let mut store = MemoryStore::new();
        insert(&mut store, 2, "Sage A", 999, Source::History, Some("7800"));
        insert(&mut store, 3, "Sage B", 999, Source::History, Some("7800"));
        insert(&mut store, 4, "Sage C", 999, Source::History, Some("7900"));
        insert(&mut store, 2, "VODAFONE DD", 999, Source::Bank, None);
        insert(&mut store, 3, "VODAFONE DD", 999, Source::Bank, None);
        insert(&mut store, 4, "vodafone dd ", 999, Source::Bank, None);

        reconcile(&mut store, 0.6).unwrap();
        let rules = store.list_rules(None).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].vendor_pattern, "vodafone dd");
        assert_eq!(rules[0].confidence.value(), 0.67, "stored at 2 dp");
        assert_eq!(rules[0].match_count, 2);
    }

    #[test]
    fn test_coded_bank_records_are_ignored() {
        let mut store = MemoryStore::new();
        insert(&mut store, 5, "ACME", 100, Source::History, Some("7100"));
        insert(&mut store, 5, "ACME BANK", 100, Source::Bank, Some("7100"));
        let report = reconcile(&mut store, 0.0).unwrap();
        assert_eq!(report.status, StageStatus::NoInput);
    }

    #[test]
    fn test_rerun_is_stable() {
        let mut store = MemoryStore::new();
        insert(&mut store, 5, "ACME LTD", 10000, Source::History, Some("7100"));
        insert(&mut store, 5, "ACME LTD TXN#55", 10000, Source::Bank, None);
        reconcile(&mut store, 0.75).unwrap();
        let first = store.list_rules(None).unwrap();
        let report = reconcile(&mut store, 0.75).unwrap();
        let second = store.list_rules(None).unwrap();
        assert_eq!(report.rules_replaced, 1);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].confidence, second[0].confidence);
    }
}
