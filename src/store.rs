use crate::error::Result;
use crate::models::{NewRecord, NewRule, Override, Record, RecordLabel, Rule, Source};

/// Which records to list. `None` means "don't filter on this field".
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter {
    pub source: Option<Source>,
    pub labeled: Option<bool>,
    pub reviewed: Option<bool>,
}

impl RecordFilter {
    pub fn source(source: Source) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    pub fn labeled(mut self, labeled: bool) -> Self {
        self.labeled = Some(labeled);
        self
    }

    pub fn reviewed(mut self, reviewed: bool) -> Self {
        self.reviewed = Some(reviewed);
        self
    }
}

/// One row of the stage audit log.
#[derive(Debug, Clone)]
pub struct StageLogEntry {
    pub stage: &'static str,
    pub action: &'static str,
    pub input_summary: String,
    pub output_summary: String,
    pub duration_ms: i64,
}

/// Record and rule persistence consumed by the learning, reconciliation,
/// classification and review stages.
///
/// Records come back in id order. Rules come back ordered by confidence
/// descending, then match count descending, then id; the classifier's
/// exact-tier tie-break depends on that ordering.
pub trait Store {
    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<Record>>;
    fn get_record(&self, id: i64) -> Result<Option<Record>>;
    fn insert_record(&mut self, record: &NewRecord) -> Result<i64>;
    fn update_record(&mut self, id: i64, label: &RecordLabel) -> Result<()>;

    fn list_rules(&self, min_confidence: Option<f64>) -> Result<Vec<Rule>>;
    fn insert_rule(&mut self, rule: &NewRule) -> Result<i64>;
    fn delete_rule(&mut self, id: i64) -> Result<bool>;
    /// Delete every rule whose pattern equals `vendor_pattern` verbatim.
    fn delete_rules_matching(&mut self, vendor_pattern: &str) -> Result<usize>;
    fn increment_rule_usage(&mut self, id: i64) -> Result<()>;

    fn insert_override(&mut self, entry: &Override) -> Result<i64>;
    fn log_stage(&mut self, entry: &StageLogEntry) -> Result<()>;

    /// Run `f` as one atomic unit: either every write lands or none does.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>;
}

#[cfg(test)]
pub use memory::MemoryStore;
