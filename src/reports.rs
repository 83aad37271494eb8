use rusqlite::Connection;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Workspace statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecordStats {
    pub total: i64,
    pub history: i64,
    pub bank: i64,
    pub reviewed: i64,
    pub coded: i64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleStats {
    pub total: i64,
    pub learned: i64,
    pub manual: i64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceStats {
    pub records: RecordStats,
    pub rules: RuleStats,
    pub overrides: i64,
}

fn round2(v: Option<f64>) -> f64 {
    v.map(|v| (v * 100.0).round() / 100.0).unwrap_or(0.0)
}

pub fn get_stats(conn: &Connection) -> Result<WorkspaceStats> {
    let records = conn.query_row(
        "SELECT count(*), \
                count(CASE WHEN source = 'history' THEN 1 END), \
                count(CASE WHEN source = 'bank' THEN 1 END), \
                count(CASE WHEN reviewed = 1 THEN 1 END), \
                count(nominal_code), \
                avg(confidence) \
         FROM records",
        [],
        |row| {
            Ok(RecordStats {
                total: row.get(0)?,
                history: row.get(1)?,
                bank: row.get(2)?,
                reviewed: row.get(3)?,
                coded: row.get(4)?,
                avg_confidence: round2(row.get(5)?),
            })
        },
    )?;

    let rules = conn.query_row(
        "SELECT count(*), \
                count(CASE WHEN created_by = 'learner' THEN 1 END), \
                count(CASE WHEN created_by = 'reviewer' THEN 1 END), \
                avg(confidence) \
         FROM rules",
        [],
        |row| {
            Ok(RuleStats {
                total: row.get(0)?,
                learned: row.get(1)?,
                manual: row.get(2)?,
                avg_confidence: round2(row.get(3)?),
            })
        },
    )?;

    let overrides = conn.query_row("SELECT count(*) FROM overrides", [], |r| r.get(0))?;

    Ok(WorkspaceStats {
        records,
        rules,
        overrides,
    })
}

// ---------------------------------------------------------------------------
// Stage log
// ---------------------------------------------------------------------------

pub struct StageRun {
    pub stage: String,
    pub action: String,
    pub output_summary: String,
    pub duration_ms: i64,
    pub created_at: String,
}

/// Most recent stage runs, newest first.
pub fn get_recent_stages(conn: &Connection, limit: usize) -> Result<Vec<StageRun>> {
    let mut stmt = conn.prepare(
        "SELECT stage, action, coalesce(output_summary, ''), coalesce(duration_ms, 0), created_at \
         FROM stage_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(StageRun {
                stage: row.get(0)?,
                action: row.get(1)?,
                output_summary: row.get(2)?,
                duration_ms: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
