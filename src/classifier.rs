use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::matcher::{normalize_vendor, similarity, FUZZY_THRESHOLD};
use crate::models::{AssignedBy, Confidence, Record, RecordLabel, Rule, Source};
use crate::pipeline::{elapsed_ms, StageStatus};
use crate::store::{RecordFilter, StageLogEntry, Store};
use crate::suggester::Suggester;

pub const NO_MATCH: &str = "no matching rule found";
pub const NEEDS_REVIEW: &str = "[NEEDS REVIEW]";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchTier {
    Exact,
    Fuzzy { score: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch<'a> {
    pub rule: &'a Rule,
    pub tier: MatchTier,
    pub confidence: f64,
    pub explanation: String,
}

/// Best rule for `vendor`, or `None`.
///
/// `rules` must be in store order (confidence desc, match count desc). The
/// exact tier returns the first rule whose normalized pattern equals the
/// normalized vendor. Failing that, the fuzzy tier takes the highest
/// similarity at or above [`FUZZY_THRESHOLD`], earlier rules winning ties,
/// and blends rule confidence with the score equally.
pub fn match_vendor<'a>(vendor: &str, rules: &'a [Rule]) -> Option<RuleMatch<'a>> {
    let vendor = normalize_vendor(vendor);

    if let Some(rule) = rules
        .iter()
        .find(|r| normalize_vendor(&r.vendor_pattern) == vendor)
    {
        return Some(RuleMatch {
            rule,
            tier: MatchTier::Exact,
            confidence: rule.confidence.value(),
            explanation: format!("Exact match for vendor '{vendor}'"),
        });
    }

    let mut best: Option<(&Rule, f64)> = None;
    for rule in rules {
        let score = similarity(&vendor, &normalize_vendor(&rule.vendor_pattern));
        if score >= FUZZY_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((rule, score));
        }
    }

    best.map(|(rule, score)| RuleMatch {
        rule,
        tier: MatchTier::Fuzzy { score },
        confidence: (rule.confidence.value() + score / 100.0) / 2.0,
        explanation: format!(
            "Fuzzy match ({score:.0}% similar) to '{}'",
            rule.vendor_pattern
        ),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyReport {
    pub status: StageStatus,
    pub processed: usize,
    pub auto_coded: usize,
    pub exceptions: usize,
    pub skipped: usize,
    pub avg_confidence: f64,
}

/// Label to write for a record given its best match.
fn label_for(
    record: &Record,
    best: Option<&RuleMatch<'_>>,
    threshold: f64,
    suggester: Option<&dyn Suggester>,
) -> Result<RecordLabel> {
    let label = match best {
        Some(m) if m.confidence >= threshold => RecordLabel {
            nominal_code: Some(m.rule.nominal_code.clone()),
            suggested_code: None,
            confidence: Some(Confidence::new(m.confidence)?),
            explanation: Some(m.explanation.clone()),
            reviewed: false,
            assigned_by: Some(AssignedBy::Classifier),
        },
        Some(m) => RecordLabel {
            nominal_code: None,
            suggested_code: Some(m.rule.nominal_code.clone()),
            confidence: Some(Confidence::new(m.confidence)?),
            explanation: Some(format!("{} {NEEDS_REVIEW}", m.explanation)),
            reviewed: false,
            assigned_by: Some(AssignedBy::Classifier),
        },
        None => {
            let hint = suggester.and_then(|s| s.suggest(record).into_iter().next());
            match hint {
                Some(h) => RecordLabel {
                    nominal_code: None,
                    suggested_code: Some(h.nominal_code),
                    confidence: Some(Confidence::new(h.confidence)?),
                    explanation: Some(format!("Suggestion: {} {NEEDS_REVIEW}", h.reason)),
                    reviewed: false,
                    assigned_by: Some(AssignedBy::Classifier),
                },
                None => RecordLabel {
                    nominal_code: None,
                    suggested_code: None,
                    confidence: None,
                    explanation: Some(format!("{NO_MATCH} {NEEDS_REVIEW}")),
                    reviewed: false,
                    assigned_by: None,
                },
            }
        }
    };
    Ok(label)
}

/// Classify every uncoded bank record against the current rules.
///
/// Matches at or above `threshold` are auto-coded and bump the rule's usage
/// counter in the same transaction. Anything else stays uncoded, annotated
/// with the best guess and a review marker.
pub fn classify<S: Store>(
    store: &mut S,
    threshold: f64,
    suggester: Option<&dyn Suggester>,
) -> Result<ClassifyReport> {
    let start = Instant::now();
    let uncoded = store.list_records(&RecordFilter::source(Source::Bank).labeled(false))?;

    if uncoded.is_empty() {
        info!("No uncoded bank records");
        return Ok(ClassifyReport {
            status: StageStatus::NoInput,
            processed: 0,
            auto_coded: 0,
            exceptions: 0,
            skipped: 0,
            avg_confidence: 0.0,
        });
    }

    let rules = store.list_rules(None)?;
    if rules.is_empty() {
        info!("Rule set is empty; every record will need review");
    }

    let mut auto_coded = 0usize;
    let mut exceptions = 0usize;
    let mut skipped = 0usize;
    let mut confidences: Vec<f64> = Vec::new();

    for record in &uncoded {
        let best = match_vendor(&record.vendor, &rules);
        let label = match label_for(record, best.as_ref(), threshold, suggester) {
            Ok(label) => label,
            Err(e) => {
                warn!("Skipping record {}: {e}", record.id);
                skipped += 1;
                continue;
            }
        };

        match (&best, label.nominal_code.is_some()) {
            (Some(m), true) => {
                let rule_id = m.rule.id;
                store.transaction(|s| {
                    s.update_record(record.id, &label)?;
                    s.increment_rule_usage(rule_id)
                })?;
                debug!("Record {} -> {} ({:.2})", record.id, m.rule.nominal_code, m.confidence);
                auto_coded += 1;
                confidences.push(m.confidence);
            }
            _ => {
                store.update_record(record.id, &label)?;
                if let Some(m) = &best {
                    confidences.push(m.confidence);
                }
                debug!("Record {} needs review: {:?}", record.id, label.explanation);
                exceptions += 1;
            }
        }
    }

    let avg_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    store.log_stage(&StageLogEntry {
        stage: "classifier",
        action: "classify_transactions",
        input_summary: format!("uncoded={}", uncoded.len()),
        output_summary: format!("auto_coded={auto_coded}, exceptions={exceptions}"),
        duration_ms: elapsed_ms(start),
    })?;
    info!(
        "Auto-coded {auto_coded}/{} records ({exceptions} exceptions)",
        uncoded.len()
    );

    Ok(ClassifyReport {
        status: StageStatus::Complete,
        processed: uncoded.len(),
        auto_coded,
        exceptions,
        skipped,
        avg_confidence,
    })
}
