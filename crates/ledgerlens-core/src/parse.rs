//! CSV loading of raw statement rows
//!
//! Expected header:
//! `date,narration,cheque_ref,value_date,withdrawal,deposit,closing_balance`.
//! Columns are looked up by name so their order does not matter;
//! `cheque_ref`, `value_date` and `closing_balance` may be missing.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::RawTransaction;

const REQUIRED: &[&str] = &["date", "narration", "withdrawal", "deposit"];

/// Read every row of a statement CSV
pub fn read_raw_csv<R: Read>(reader: R) -> Result<Vec<RawTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    for name in REQUIRED {
        if column(name).is_none() {
            return Err(Error::Parse(format!("Missing column: {}", name)));
        }
    }
    let cols = Columns {
        date: column("date"),
        narration: column("narration"),
        cheque_ref: column("cheque_ref"),
        value_date: column("value_date"),
        withdrawal: column("withdrawal"),
        deposit: column("deposit"),
        closing_balance: column("closing_balance"),
    };

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1
        let line = i + 2;
        let text = |idx: Option<usize>| cell(&record, idx).to_string();
        let amount = |idx: Option<usize>, name: &str| {
            parse_amount(cell(&record, idx))
                .map_err(|e| Error::Parse(format!("Line {}: bad {}: {}", line, name, e)))
        };

        let date = text(cols.date);
        rows.push(RawTransaction {
            value_date: match text(cols.value_date) {
                v if v.is_empty() => date.clone(),
                v => v,
            },
            date,
            narration: text(cols.narration),
            cheque_ref: text(cols.cheque_ref),
            withdrawal: amount(cols.withdrawal, "withdrawal")?,
            deposit: amount(cols.deposit, "deposit")?,
            closing_balance: amount(cols.closing_balance, "closing_balance")?,
        });
    }

    debug!(rows = rows.len(), "Read statement rows");
    Ok(rows)
}

struct Columns {
    date: Option<usize>,
    narration: Option<usize>,
    cheque_ref: Option<usize>,
    value_date: Option<usize>,
    withdrawal: Option<usize>,
    deposit: Option<usize>,
    closing_balance: Option<usize>,
}

fn cell(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

/// Parse an amount cell. Blank means zero; thousands separators and a
/// leading rupee sign are ignored.
pub fn parse_amount(s: &str) -> std::result::Result<f64, String> {
    let cleaned: String = s
        .trim()
        .trim_start_matches('₹')
        .replace([',', ' '], "");
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("not a number: {:?}", s)),
    }
}
