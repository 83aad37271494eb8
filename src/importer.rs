use std::path::Path;

use chrono::NaiveDate;
use rusqlite::params;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::SqliteStore;
use crate::error::{NominalError, Result};
use crate::models::{Amount, NewRecord, Source};
use crate::store::Store;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a money cell: thousands separators, currency symbols and
/// parenthesised negatives are accepted.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s: String = raw
        .chars()
        .filter(|c| !matches!(*c, ',' | '"' | '£' | '$' | '€') && !c.is_whitespace())
        .collect();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.parse::<Decimal>().ok().map(|d| -d);
    }
    s.parse().ok()
}

/// `YYYY-MM-DD` or UK-style `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Columns {
    date: usize,
    vendor: usize,
    amount: usize,
    details: Option<usize>,
    nominal_code: Option<usize>,
    reference: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase().replace('_', " ");
                names.contains(&h.as_str())
            })
        };
        let missing = |col: &str| NominalError::Other(format!("CSV is missing a '{col}' column"));

        let details = find(&["details", "description"]);
        // Details doubles as the vendor when there is no vendor column.
        let vendor = find(&["vendor", "payee"])
            .or(details)
            .ok_or_else(|| missing("Vendor"))?;
        Ok(Self {
            date: find(&["date"]).ok_or_else(|| missing("Date"))?,
            vendor,
            amount: find(&["amount"]).ok_or_else(|| missing("Amount"))?,
            details: details.filter(|d| *d != vendor),
            nominal_code: find(&["nominal code", "nominal", "code"]),
            reference: find(&["reference", "ref"]),
        })
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ParsedFile {
    pub records: Vec<NewRecord>,
    pub skipped: usize,
}

fn cell<'a>(row: &'a csv::StringRecord, idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read a headed CSV into records. Rows with an unparseable date or amount,
/// a zero or out-of-range amount, or no vendor are skipped and counted.
pub fn parse_csv(file_path: &Path, source: Source) -> Result<ParsedFile> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));
    let columns = Columns::from_headers(rdr.headers()?)?;

    let mut parsed = ParsedFile::default();
    for (line, result) in rdr.records().enumerate() {
        let Ok(row) = result else {
            parsed.skipped += 1;
            continue;
        };
        let record = cell(&row, Some(columns.date))
            .and_then(parse_date)
            .zip(cell(&row, Some(columns.amount)).and_then(parse_amount))
            .and_then(|(date, amount)| {
                let amount = Amount::new(amount).ok()?;
                let vendor = cell(&row, Some(columns.vendor))?;
                NewRecord::new(date, vendor, amount, source).ok()
            });
        let Some(mut record) = record else {
            debug!("Skipping row {} of {}", line + 2, file_path.display());
            parsed.skipped += 1;
            continue;
        };

        record.details = cell(&row, columns.details).map(str::to_string);
        record.reference = cell(&row, columns.reference).map(str::to_string);
        if source == Source::History {
            record = record.with_code(cell(&row, columns.nominal_code));
        }
        parsed.records.push(record);
    }
    if parsed.skipped > 0 {
        warn!("Skipped {} unreadable row(s) in {}", parsed.skipped, file_path.display());
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub duplicate_file: bool,
}

/// Load a CSV into the workspace as one batch. Re-importing a byte-identical
/// file for the same source is reported and does nothing.
pub fn import_file(store: &mut SqliteStore, file_path: &Path, source: Source) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    let already = store
        .conn()
        .prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND source = ?2")?
        .exists(params![checksum, source.as_str()])?;
    if already {
        info!("{} already imported", file_path.display());
        return Ok(ImportResult {
            imported: 0,
            skipped: 0,
            duplicate_file: true,
        });
    }

    let parsed = parse_csv(file_path, source)?;
    let min_date = parsed.records.iter().map(|r| r.date).min();
    let max_date = parsed.records.iter().map(|r| r.date).max();
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    store.transaction(|s| {
        s.conn().execute(
            "INSERT INTO imports (filename, source, record_count, date_range_start, date_range_end, checksum) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                filename,
                source.as_str(),
                parsed.records.len() as i64,
                min_date.map(|d| d.to_string()),
                max_date.map(|d| d.to_string()),
                checksum,
            ],
        )?;
        let import_id = s.conn().last_insert_rowid();
        for record in &parsed.records {
            let id = s.insert_record(record)?;
            s.conn()
                .execute("UPDATE records SET import_id = ?1 WHERE id = ?2", params![import_id, id])?;
        }
        Ok(())
    })?;

    info!(
        "Imported {} {source} record(s) from {filename}, skipped {}",
        parsed.records.len(),
        parsed.skipped
    );
    Ok(ImportResult {
        imported: parsed.records.len(),
        skipped: parsed.skipped,
        duplicate_file: false,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::db::tests::test_store;
    use crate::models::AssignedBy;
    use crate::store::RecordFilter;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("\"500.00\""), Some(Decimal::new(500, 0)));
        assert_eq!(parse_amount("  -42.50  "), Some(Decimal::new(-4250, 2)));
        assert_eq!(parse_amount("not_a_number"), None);
    }

    #[test]
    fn test_parse_amount_symbols_and_parens() {
        assert_eq!(parse_amount("£12.00"), Some(Decimal::new(12, 0)));
        assert_eq!(parse_amount("(1,000.50)"), Some(Decimal::new(-100050, 2)));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("15/03/2024"), expected);
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("March 15"), None);
    }

    #[test]
    fn test_parse_history_with_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "history.csv",
            "Date,Vendor,Amount,Nominal Code,Reference,Details\n\
             2024-01-05,ACME LTD,100.00,7100,INV1,Widgets\n\
             06/01/2024,Costa,-3.20,,,\n",
        );
        let parsed = parse_csv(&path, Source::History).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.skipped, 0);
        let first = &parsed.records[0];
        assert_eq!(first.nominal_code.as_deref(), Some("7100"));
        assert_eq!(first.reference.as_deref(), Some("INV1"));
        assert_eq!(first.details.as_deref(), Some("Widgets"));
        assert_eq!(parsed.records[1].nominal_code, None);
    }

    #[test]
    fn test_bank_codes_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bank.csv", "Date,Vendor,Amount,Nominal Code\n2024-01-05,ACME,1.00,7100\n");
        let parsed = parse_csv(&path, Source::Bank).unwrap();
        assert_eq!(parsed.records[0].nominal_code, None);
    }

    #[test]
    fn test_details_column_as_vendor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bank.csv", "Date,Details,Amount\n2024-01-05,CARD PAYMENT COSTA,-3.20\n");
        let parsed = parse_csv(&path, Source::Bank).unwrap();
        assert_eq!(parsed.records[0].vendor, "CARD PAYMENT COSTA");
        assert_eq!(parsed.records[0].details, None);
    }

    #[test]
    fn test_bad_rows_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "bank.csv",
            "Date,Vendor,Amount\n\
             2024-01-05,ACME,0.00\n\
             not a date,ACME,1.00\n\
             2024-01-05,,1.00\n\
             2024-01-05,ACME,abc\n\
             2024-01-06,GOOD,2.50\n",
        );
        let parsed = parse_csv(&path, Source::Bank).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.skipped, 4);
    }

    #[test]
    fn test_oversized_amount_skipped_not_fatal() {
        let (dir, mut store) = test_store();
        let path = write_csv(
            dir.path(),
            "bank.csv",
            "Date,Vendor,Amount\n\
             2024-01-05,WHALE,100000000000000000.00\n\
             2024-01-06,GOOD,2.50\n",
        );
        let result = import_file(&mut store, &path, Source::Bank).unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(result.skipped, 1);
        let records = store.list_records(&RecordFilter::source(Source::Bank)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vendor, "GOOD");
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bad.csv", "When,Vendor,Amount\n2024-01-05,ACME,1.00\n");
        assert!(parse_csv(&path, Source::Bank).is_err());
    }

    #[test]
    fn test_import_file_inserts_records() {
        let (dir, mut store) = test_store();
        let path = write_csv(
            dir.path(),
            "history.csv",
            "Date,Vendor,Amount,Nominal Code\n2024-01-05,ACME,100.00,7100\n2024-01-06,ACME,50.00,7100\n",
        );
        let result = import_file(&mut store, &path, Source::History).unwrap();
        assert_eq!(result.imported, 2);
        assert!(!result.duplicate_file);

        let records = store.list_records(&RecordFilter::source(Source::History)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].assigned_by, Some(AssignedBy::Manual));

        let (count, start): (i64, String) = store
            .conn()
            .query_row(
                "SELECT record_count, date_range_start FROM imports",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(start, "2024-01-05");
        let linked: i64 = store
            .conn()
            .query_row("SELECT count(*) FROM records WHERE import_id IS NOT NULL", [], |r| r.get(0))
            .unwrap();
        assert_eq!(linked, 2);
    }

    #[test]
    fn test_import_file_detects_file_duplicate() {
        let (dir, mut store) = test_store();
        let path = write_csv(dir.path(), "bank.csv", "Date,Vendor,Amount\n2024-01-05,ACME,-1.00\n");
        import_file(&mut store, &path, Source::Bank).unwrap();
        let again = import_file(&mut store, &path, Source::Bank).unwrap();
        assert!(again.duplicate_file);
        assert_eq!(store.list_records(&RecordFilter::default()).unwrap().len(), 1);
    }
}
