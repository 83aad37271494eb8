use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::models::{Amount, Record, Source};
use crate::pipeline::{elapsed_ms, StageStatus};
use crate::store::{RecordFilter, StageLogEntry, Store};

pub const DEFAULT_EXPORT_FILE: &str = "sage_import.csv";

/// One line of a Sage 50 audit-trail import.
#[derive(Debug, Serialize)]
struct SageRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Reference")]
    reference: &'a str,
    #[serde(rename = "Nominal Code")]
    nominal_code: &'a str,
    #[serde(rename = "Details")]
    details: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Debit")]
    debit: String,
    #[serde(rename = "Credit")]
    credit: String,
}

fn magnitude(amount: Amount) -> String {
    format!("{:.2}", amount.value().abs())
}

impl<'a> SageRow<'a> {
    fn from_record(record: &'a Record, code: &'a str) -> Self {
        let zero = "0.00".to_string();
        let (debit, credit) = if record.amount.is_negative() {
            (zero, magnitude(record.amount))
        } else {
            (magnitude(record.amount), zero)
        };
        Self {
            date: record.date.format("%Y-%m-%d").to_string(),
            reference: record.reference.as_deref().unwrap_or_default(),
            nominal_code: code,
            details: &record.vendor,
            amount: magnitude(record.amount),
            debit,
            credit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub status: StageStatus,
    pub exported: usize,
}

/// Write every coded bank record to `output` as Sage CSV. Suggestions that
/// never cleared review are not exported.
pub fn export_sage<S: Store>(store: &mut S, output: &Path) -> Result<ExportReport> {
    let start = Instant::now();
    let coded = store.list_records(&RecordFilter::source(Source::Bank).labeled(true))?;
    if coded.is_empty() {
        info!("No coded bank records to export");
        return Ok(ExportReport {
            status: StageStatus::NoInput,
            exported: 0,
        });
    }

    let mut writer = csv::Writer::from_path(output)?;
    let mut exported = 0usize;
    for record in &coded {
        let Some(code) = record.nominal_code.as_deref() else {
            continue;
        };
        writer.serialize(SageRow::from_record(record, code))?;
        exported += 1;
    }
    writer.flush()?;

    store.log_stage(&StageLogEntry {
        stage: "exporter",
        action: "export_transactions",
        input_summary: format!("coded={}", coded.len()),
        output_summary: format!("file={}", output.display()),
        duration_ms: elapsed_ms(start),
    })?;
    info!("Exported {exported} record(s) to {}", output.display());
    Ok(ExportReport {
        status: StageStatus::Complete,
        exported,
    })
}
