use tracing::info;

use crate::error::{NominalError, Result};
use crate::matcher::normalize_vendor;
use crate::models::{
    AssignedBy, Confidence, NewRule, Override, Record, RecordLabel, RuleOrigin, RuleType, Source,
};
use crate::store::{RecordFilter, Store};

/// Unreviewed bank records with no confidence or one below `threshold`.
pub fn review_queue<S: Store>(store: &S, threshold: f64) -> Result<Vec<Record>> {
    let records = store.list_records(&RecordFilter::source(Source::Bank).reviewed(false))?;
    Ok(records
        .into_iter()
        .filter(|r| r.confidence.map_or(true, |c| c.value() < threshold))
        .collect())
}

/// Retire every rule that could shadow a reviewer rule for `vendor`, then
/// insert the reviewer rule. Runs inside the caller's transaction.
fn install_reviewer_rule<S: Store>(store: &mut S, vendor: &str, code: &str) -> Result<i64> {
    let mut retired = store.delete_rules_matching(vendor)?;

    // A verbatim delete misses learned patterns (stored normalized) and older
    // reviewer rules that differ only in case or spacing. Either would tie
    // the new rule at 1.0 and win on count or id.
    let normalized = normalize_vendor(vendor);
    for stale in store
        .list_rules(None)?
        .into_iter()
        .filter(|r| normalize_vendor(&r.vendor_pattern) == normalized)
    {
        if store.delete_rule(stale.id)? {
            retired += 1;
        }
    }

    let rule = NewRule::new(vendor, code, RuleType::Exact, Confidence::MAX, RuleOrigin::Reviewer)?;
    let id = store.insert_rule(&rule)?;
    info!("Rule {id}: '{vendor}' -> {code} (retired {retired})");
    Ok(id)
}

/// Apply a human correction to one bank record.
///
/// The record takes `corrected_code` at confidence 1.0 and is marked
/// reviewed. With `create_rule`, rules for the record's vendor text are
/// replaced by an exact reviewer rule so the correction outranks anything
/// learned. Returns the new rule id, if any.
pub fn override_record<S: Store>(
    store: &mut S,
    record_id: i64,
    corrected_code: &str,
    create_rule: bool,
) -> Result<Option<i64>> {
    let corrected_code = corrected_code.trim();
    if corrected_code.is_empty() {
        return Err(NominalError::InvalidRecord("corrected code cannot be empty".into()));
    }
    let record = store
        .get_record(record_id)?
        .ok_or(NominalError::UnknownRecord(record_id))?;
    if record.source == Source::History {
        return Err(NominalError::InvalidRecord(format!(
            "record {record_id} is history; history labels are ground truth"
        )));
    }

    let original_code = record.nominal_code.clone();
    let label = RecordLabel {
        nominal_code: Some(corrected_code.to_string()),
        suggested_code: None,
        confidence: Some(Confidence::MAX),
        explanation: Some(format!(
            "User override from {} to {corrected_code}",
            original_code.as_deref().unwrap_or("uncoded")
        )),
        reviewed: true,
        assigned_by: Some(AssignedBy::Override),
    };

    store.transaction(|s| {
        s.update_record(record_id, &label)?;
        let rule_id = if create_rule {
            Some(install_reviewer_rule(s, &record.vendor, corrected_code)?)
        } else {
            None
        };
        s.insert_override(&Override {
            transaction_id: record_id,
            original_code: original_code.clone(),
            corrected_code: corrected_code.to_string(),
            created_rule_id: rule_id,
        })?;
        Ok(rule_id)
    })
}

/// Confirm a record's current code, or its pending suggestion, as reviewed.
pub fn approve_record<S: Store>(store: &mut S, record_id: i64) -> Result<String> {
    let record = store
        .get_record(record_id)?
        .ok_or(NominalError::UnknownRecord(record_id))?;
    let code = record
        .nominal_code
        .clone()
        .or_else(|| record.suggested_code.clone())
        .ok_or_else(|| {
            NominalError::InvalidRecord(format!("record {record_id} has no code to approve"))
        })?;

    let label = RecordLabel {
        nominal_code: Some(code.clone()),
        suggested_code: None,
        confidence: Some(Confidence::MAX),
        explanation: Some(format!("Approved by reviewer as {code}")),
        reviewed: true,
        assigned_by: Some(AssignedBy::Reviewer),
    };
    store.update_record(record_id, &label)?;
    Ok(code)
}

/// Add a reviewer rule by hand, with the same precedence as an override.
pub fn add_manual_rule<S: Store>(store: &mut S, vendor_pattern: &str, code: &str) -> Result<i64> {
    let vendor_pattern = vendor_pattern.trim();
    store.transaction(|s| install_reviewer_rule(s, vendor_pattern, code))
}
