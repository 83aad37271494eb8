use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::error::{NominalError, Result};
use crate::models::{
    Amount, AssignedBy, Confidence, NewRecord, NewRule, Override, Record, RecordLabel, Rule,
    RuleOrigin, RuleType, Source,
};
use crate::store::{RecordFilter, StageLogEntry, Store};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    source TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    date TEXT NOT NULL,
    vendor TEXT NOT NULL,
    amount_cents INTEGER NOT NULL CHECK (amount_cents != 0),
    nominal_code TEXT,
    suggested_code TEXT,
    reference TEXT,
    details TEXT,
    source TEXT NOT NULL CHECK (source IN ('history', 'bank')),
    confidence REAL,
    explanation TEXT,
    reviewed INTEGER DEFAULT 0,
    assigned_by TEXT,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_records_source ON records(source, nominal_code);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    vendor_pattern TEXT NOT NULL,
    nominal_code TEXT NOT NULL,
    rule_type TEXT NOT NULL CHECK (rule_type IN ('exact', 'fuzzy')),
    confidence REAL NOT NULL CHECK (confidence >= 0 AND confidence <= 1),
    match_count INTEGER DEFAULT 0,
    created_by TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    last_used TEXT
);

CREATE INDEX IF NOT EXISTS idx_rules_pattern ON rules(vendor_pattern);

CREATE TABLE IF NOT EXISTS overrides (
    id INTEGER PRIMARY KEY,
    transaction_id INTEGER NOT NULL,
    original_code TEXT,
    corrected_code TEXT NOT NULL,
    created_rule_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (transaction_id) REFERENCES records(id)
);

CREATE TABLE IF NOT EXISTS stage_log (
    id INTEGER PRIMARY KEY,
    stage TEXT NOT NULL,
    action TEXT NOT NULL,
    input_summary TEXT,
    output_summary TEXT,
    duration_ms INTEGER,
    created_at TEXT DEFAULT (datetime('now'))
);
";

const RECORD_COLUMNS: &str = "id, date, vendor, amount_cents, nominal_code, suggested_code, \
     reference, details, source, confidence, explanation, reviewed, assigned_by";

const RULE_COLUMNS: &str =
    "id, vendor_pattern, nominal_code, rule_type, confidence, match_count, created_by, last_used";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Raw column values for a record, before validation.
type RawRecord = (
    i64,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<f64>,
    Option<String>,
    bool,
    Option<String>,
);

fn raw_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn build_record(raw: RawRecord) -> Result<Record> {
    let (id, date, vendor, cents, nominal_code, suggested_code, reference, details, source, confidence, explanation, reviewed, assigned_by) =
        raw;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| NominalError::InvalidRecord(format!("record {id}: bad date {date:?}: {e}")))?;
    let source = Source::parse(&source)
        .ok_or_else(|| NominalError::InvalidRecord(format!("record {id}: bad source {source:?}")))?;
    Ok(Record {
        id,
        date,
        vendor,
        amount: Amount::from_cents(cents)?,
        nominal_code,
        suggested_code,
        reference,
        details,
        source,
        confidence: confidence.map(Confidence::new).transpose()?,
        explanation,
        reviewed,
        assigned_by: assigned_by.as_deref().and_then(AssignedBy::parse),
    })
}

type RawRule = (i64, String, String, String, f64, i64, String, Option<String>);

fn raw_rule(row: &Row<'_>) -> rusqlite::Result<RawRule> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn build_rule(raw: RawRule) -> Result<Rule> {
    let (id, vendor_pattern, nominal_code, rule_type, confidence, match_count, created_by, last_used) = raw;
    let rule_type = RuleType::parse(&rule_type)
        .ok_or_else(|| NominalError::InvalidRule(format!("rule {id}: bad type {rule_type:?}")))?;
    let created_by = RuleOrigin::parse(&created_by)
        .ok_or_else(|| NominalError::InvalidRule(format!("rule {id}: bad origin {created_by:?}")))?;
    Ok(Rule {
        id,
        vendor_pattern,
        nominal_code,
        rule_type,
        confidence: Confidence::new(confidence)?,
        match_count,
        created_by,
        last_used: last_used
            .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
    })
}

/// SQLite-backed [`Store`] for one workspace database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Store for SqliteStore {
    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE 1=1");
        let mut args: Vec<&dyn rusqlite::ToSql> = Vec::new();
        let source = filter.source.map(|s| s.as_str());
        if let Some(source) = source.as_ref() {
            sql.push_str(" AND source = ?");
            args.push(source);
        }
        match filter.labeled {
            Some(true) => sql.push_str(" AND nominal_code IS NOT NULL"),
            Some(false) => sql.push_str(" AND nominal_code IS NULL"),
            None => {}
        }
        if let Some(reviewed) = filter.reviewed.as_ref() {
            sql.push_str(" AND reviewed = ?");
            args.push(reviewed);
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(args.as_slice(), raw_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(raws.len());
        for raw in raws {
            match build_record(raw) {
                Ok(r) => records.push(r),
                Err(e) => warn!("Skipping malformed record: {e}"),
            }
        }
        Ok(records)
    }

    fn get_record(&self, id: i64) -> Result<Option<Record>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                [id],
                raw_record,
            )
            .optional()?;
        raw.map(build_record).transpose()
    }

    fn insert_record(&mut self, record: &NewRecord) -> Result<i64> {
        let assigned_by = record.nominal_code.as_ref().map(|_| AssignedBy::Manual.as_str());
        self.conn.execute(
            "INSERT INTO records (date, vendor, amount_cents, nominal_code, reference, details, source, assigned_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.date.format("%Y-%m-%d").to_string(),
                record.vendor,
                record.amount.cents(),
                record.nominal_code,
                record.reference,
                record.details,
                record.source.as_str(),
                assigned_by,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_record(&mut self, id: i64, label: &RecordLabel) -> Result<()> {
        self.conn.execute(
            "UPDATE records SET nominal_code = ?1, suggested_code = ?2, confidence = ?3, \
             explanation = ?4, reviewed = ?5, assigned_by = ?6 WHERE id = ?7",
            params![
                label.nominal_code,
                label.suggested_code,
                label.confidence.map(Confidence::value),
                label.explanation,
                label.reviewed,
                label.assigned_by.map(|a| a.as_str()),
                id,
            ],
        )?;
        Ok(())
    }

    fn list_rules(&self, min_confidence: Option<f64>) -> Result<Vec<Rule>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM rules WHERE confidence >= ?1 \
             ORDER BY confidence DESC, match_count DESC, id ASC"
        ))?;
        let raws = stmt
            .query_map([min_confidence.unwrap_or(0.0)], raw_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rules = Vec::with_capacity(raws.len());
        for raw in raws {
            match build_rule(raw) {
                Ok(r) => rules.push(r),
                Err(e) => warn!("Skipping malformed rule: {e}"),
            }
        }
        Ok(rules)
    }

    fn insert_rule(&mut self, rule: &NewRule) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO rules (vendor_pattern, nominal_code, rule_type, confidence, match_count, created_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                rule.vendor_pattern,
                rule.nominal_code,
                rule.rule_type.as_str(),
                rule.confidence.value(),
                rule.match_count,
                rule.created_by.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_rule(&mut self, id: i64) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM rules WHERE id = ?1", [id])?;
        Ok(n > 0)
    }

    fn delete_rules_matching(&mut self, vendor_pattern: &str) -> Result<usize> {
        let n = self
            .conn
            .execute("DELETE FROM rules WHERE vendor_pattern = ?1", [vendor_pattern])?;
        Ok(n)
    }

    fn increment_rule_usage(&mut self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE rules SET match_count = match_count + 1, last_used = datetime('now') WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }

    fn insert_override(&mut self, entry: &Override) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO overrides (transaction_id, original_code, corrected_code, created_rule_id) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.transaction_id,
                entry.original_code,
                entry.corrected_code,
                entry.created_rule_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn log_stage(&mut self, entry: &StageLogEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO stage_log (stage, action, input_summary, output_summary, duration_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.stage,
                entry.action,
                entry.input_summary,
                entry.output_summary,
                entry.duration_ms,
            ],
        )?;
        Ok(())
    }

    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!("Rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }
}
