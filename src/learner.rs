use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::matcher::normalize_vendor;
use crate::models::{Confidence, NewRule, RuleOrigin, RuleType, Source};
use crate::pipeline::{elapsed_ms, StageStatus};
use crate::store::{RecordFilter, StageLogEntry, Store};

/// Winning code for one normalized vendor.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorMajority {
    pub vendor: String,
    pub nominal_code: String,
    pub majority_count: i64,
    pub total_count: i64,
    pub confidence: Confidence,
}

struct VendorTally {
    vendor: String,
    // Codes in first-seen order; the order breaks ties.
    codes: Vec<(String, i64)>,
}

/// Majority vote of nominal codes per normalized vendor.
///
/// Vendors come back in first-seen order. On a tied tally the code seen first
/// wins. Blank vendors are skipped.
pub fn majority_by_vendor<'a, I>(pairs: I) -> Vec<VendorMajority>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut tallies: Vec<VendorTally> = Vec::new();

    for (vendor, code) in pairs {
        let vendor = normalize_vendor(vendor);
        if vendor.is_empty() {
            warn!("Skipping record with blank vendor text");
            continue;
        }
        let slot = *index.entry(vendor.clone()).or_insert_with(|| {
            tallies.push(VendorTally {
                vendor,
                codes: Vec::new(),
            });
            tallies.len() - 1
        });
        let codes = &mut tallies[slot].codes;
        match codes.iter_mut().find(|(c, _)| c == code) {
            Some((_, n)) => *n += 1,
            None => codes.push((code.to_string(), 1)),
        }
    }

    tallies
        .into_iter()
        .filter_map(|t| {
            let total: i64 = t.codes.iter().map(|(_, n)| n).sum();
            let mut best: Option<&(String, i64)> = None;
            for entry in &t.codes {
                if best.map_or(true, |b| entry.1 > b.1) {
                    best = Some(entry);
                }
            }
            let (code, count) = best?;
            let confidence = Confidence::new(*count as f64 / total as f64).ok()?;
            Some(VendorMajority {
                nominal_code: code.clone(),
                majority_count: *count,
                total_count: total,
                confidence,
                vendor: t.vendor,
            })
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InstallOutcome {
    pub created: usize,
    pub replaced: usize,
    /// Candidates dropped because a reviewer rule already owns the vendor.
    pub reviewer_owned: usize,
}

/// Insert learned rules for every majority at or above `min_confidence`.
///
/// Confidence is compared unrounded and stored rounded to 2 dp. A prior
/// learner rule with the same pattern and type is replaced, so re-runs don't
/// pile up duplicates; the replacement keeps the larger of its tally and the
/// prior rule's usage count. Vendors covered by a reviewer rule are left alone.
pub(crate) fn install_rules<S: Store>(
    store: &mut S,
    majorities: &[VendorMajority],
    rule_type: RuleType,
    min_confidence: f64,
) -> Result<InstallOutcome> {
    store.transaction(|store| {
        let existing = store.list_rules(None)?;
        let reviewer_owned: HashSet<String> = existing
            .iter()
            .filter(|r| r.created_by == RuleOrigin::Reviewer)
            .map(|r| normalize_vendor(&r.vendor_pattern))
            .collect();

        let mut outcome = InstallOutcome::default();
        for m in majorities.iter().filter(|m| m.confidence.value() >= min_confidence) {
            if reviewer_owned.contains(&m.vendor) {
                debug!("Keeping reviewer rule for '{}'", m.vendor);
                outcome.reviewer_owned += 1;
                continue;
            }
            // Usage earned by the rule being replaced carries over.
            let mut carried = 0;
            for prior in existing.iter().filter(|r| {
                r.created_by == RuleOrigin::Learner
                    && r.rule_type == rule_type
                    && r.vendor_pattern == m.vendor
            }) {
                if store.delete_rule(prior.id)? {
                    carried = carried.max(prior.match_count);
                    outcome.replaced += 1;
                }
            }
            let rule = NewRule::new(
                &m.vendor,
                &m.nominal_code,
                rule_type,
                m.confidence.round2(),
                RuleOrigin::Learner,
            )?
            .with_match_count(m.majority_count.max(carried));
            let id = store.insert_rule(&rule)?;
            debug!(
                "Rule {id}: '{}' -> {} ({}, {}/{})",
                m.vendor, m.nominal_code, rule.confidence, m.majority_count, m.total_count
            );
            outcome.created += 1;
        }
        Ok(outcome)
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearnReport {
    pub status: StageStatus,
    pub history_records: usize,
    pub vendors_seen: usize,
    pub rules_created: usize,
    pub rules_replaced: usize,
    pub reviewer_owned: usize,
    pub avg_confidence: f64,
}

/// Learn fuzzy vendor rules from labeled history records.
pub fn learn<S: Store>(store: &mut S, min_confidence: f64) -> Result<LearnReport> {
    let start = Instant::now();
    let history = store.list_records(&RecordFilter::source(Source::History).labeled(true))?;

    if history.is_empty() {
        info!("No labeled history records; nothing to learn");
        return Ok(LearnReport {
            status: StageStatus::NoInput,
            history_records: 0,
            vendors_seen: 0,
            rules_created: 0,
            rules_replaced: 0,
            reviewer_owned: 0,
            avg_confidence: 0.0,
        });
    }

    let majorities = majority_by_vendor(
        history
            .iter()
            .filter_map(|r| r.nominal_code.as_deref().map(|c| (r.vendor.as_str(), c))),
    );
    let outcome = install_rules(store, &majorities, RuleType::Fuzzy, min_confidence)?;

    let avg_confidence = if majorities.is_empty() {
        0.0
    } else {
        majorities.iter().map(|m| m.confidence.value()).sum::<f64>() / majorities.len() as f64
    };

    store.log_stage(&StageLogEntry {
        stage: "learner",
        action: "learn_patterns",
        input_summary: format!("history_records={}", history.len()),
        output_summary: format!("rules_created={}", outcome.created),
        duration_ms: elapsed_ms(start),
    })?;
    info!(
        "Learned {} rules from {} vendors ({} history records)",
        outcome.created,
        majorities.len(),
        history.len()
    );

    Ok(LearnReport {
        status: StageStatus::Complete,
        history_records: history.len(),
        vendors_seen: majorities.len(),
        rules_created: outcome.created,
        rules_replaced: outcome.replaced,
        reviewer_owned: outcome.reviewer_owned,
        avg_confidence,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Amount, NewRecord};
    use crate::store::MemoryStore;

    fn add_history(store: &mut MemoryStore, vendor: &str, code: &str, times: usize) {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        for _ in 0..times {
            let rec = NewRecord::new(date, vendor, Amount::from_cents(10000).unwrap(), Source::History)
                .unwrap()
                .with_code(Some(code));
            store.insert_record(&rec).unwrap();
        }
    }

    #[test]
    fn test_majority_three_to_one() {
        let mut store = MemoryStore::new();
        add_history(&mut store, "ACME LTD", "7100", 3);
        add_history(&mut store, "ACME LTD", "5000", 1);

        let report = learn(&mut store, 0.75).unwrap();
        assert_eq!(report.status, StageStatus::Complete);
        assert_eq!(report.rules_created, 1);
        assert_eq!(report.vendors_seen, 1);

        let rules = store.list_rules(None).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].vendor_pattern, "acme ltd");
        assert_eq!(rules[0].nominal_code, "7100");
        assert_eq!(rules[0].confidence.value(), 0.75);
        assert_eq!(rules[0].rule_type, RuleType::Fuzzy);
        assert_eq!(rules[0].match_count, 3);
        assert_eq!(rules[0].created_by, RuleOrigin::Learner);
    }

    #[test]
    fn test_below_threshold_not_emitted() {
        let mut store = MemoryStore::new();
        add_history(&mut store, "SPLIT VENDOR", "7100", 2);
        add_history(&mut store, "SPLIT VENDOR", "5000", 1);

        let report = learn(&mut store, 0.75).unwrap();
        assert_eq!(report.rules_created, 0);
        assert_eq!(report.vendors_seen, 1);
        assert!((report.avg_confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_vendor_text_is_normalized() {
        let mut store = MemoryStore::new();
        add_history(&mut store, "Tesco Stores ", "5000", 1);
        add_history(&mut store, "  TESCO STORES", "5000", 1);

        let report = learn(&mut store, 0.5).unwrap();
        assert_eq!(report.vendors_seen, 1);
        assert_eq!(store.list_rules(None).unwrap()[0].match_count, 2);
    }

    #[test]
    fn test_tie_goes_to_first_seen_code() {
        let majorities = majority_by_vendor(vec![
            ("Shell", "7500"),
            ("Shell", "7400"),
            ("shell", "7400"),
            ("SHELL", "7500"),
        ]);
        assert_eq!(majorities.len(), 1);
        assert_eq!(majorities[0].nominal_code, "7500");
        assert_eq!(majorities[0].confidence.value(), 0.5);
    }

    #[test]
    fn test_vendors_in_first_seen_order() {
        let majorities = majority_by_vendor(vec![("b", "1"), ("a", "2"), ("b", "1")]);
        let vendors: Vec<&str> = majorities.iter().map(|m| m.vendor.as_str()).collect();
        assert_eq!(vendors, vec!["b", "a"]);
    }

    #[test]
    fn test_no_history_is_not_an_error() {
        let mut store = MemoryStore::new();
        let report = learn(&mut store, 0.75).unwrap();
        assert_eq!(report.status, StageStatus::NoInput);
        assert!(store.list_rules(None).unwrap().is_empty());
    }

    #[test]
    fn test_rerun_replaces_instead_of_duplicating() {
        let mut store = MemoryStore::new();
        add_history(&mut store, "ACME LTD", "7100", 4);
        learn(&mut store, 0.75).unwrap();
        let second = learn(&mut store, 0.75).unwrap();
        assert_eq!(second.rules_replaced, 1);
        assert_eq!(store.list_rules(None).unwrap().len(), 1);
    }

    #[test]
    fn test_rerun_keeps_usage_count() {
        let mut store = MemoryStore::new();
        add_history(&mut store, "ACME LTD", "7100", 4);
        learn(&mut store, 0.75).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let bank = NewRecord::new(date, "ACME LTD", Amount::from_cents(-500).unwrap(), Source::Bank).unwrap();
        store.insert_record(&bank).unwrap();
        crate::classifier::classify(&mut store, 0.70, None).unwrap();
        assert_eq!(store.list_rules(None).unwrap()[0].match_count, 5);

        learn(&mut store, 0.75).unwrap();
        let rules = store.list_rules(None).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].match_count, 5);
    }

    #[test]
    fn test_reviewer_rule_is_not_shadowed() {
        let mut store = MemoryStore::new();
        add_history(&mut store, "ACME LTD", "7100", 4);
        let manual = NewRule::new("ACME LTD", "7403", RuleType::Exact, Confidence::MAX, RuleOrigin::Reviewer)
            .unwrap();
        store.insert_rule(&manual).unwrap();

        let report = learn(&mut store, 0.75).unwrap();
        assert_eq!(report.rules_created, 0);
        assert_eq!(report.reviewer_owned, 1);
        let rules = store.list_rules(None).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].nominal_code, "7403");
    }

    #[test]
    fn test_logs_stage() {
        let mut store = MemoryStore::new();
        add_history(&mut store, "ACME LTD", "7100", 1);
        learn(&mut store, 0.75).unwrap();
        assert_eq!(store.stage_log.len(), 1);
        assert_eq!(store.stage_log[0].0, "learner");
    }
}
