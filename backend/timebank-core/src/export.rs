// src/export.rs
//
// CSV export of per-entry results. Columns:
// id,date,clock_in,lunch_out,lunch_in,clock_out,worked_minutes,expected_minutes,balance_minutes,worked,balance,valid,issue,note
//
// Figures come straight from `EntryResult`, so the exported file always
// matches the report table.

use csv::WriterBuilder;
use std::io::Write;
use thiserror::Error;
use tracing::info;

use crate::aggregator::{EntryResult, Report};
use crate::clock::{format_balance, format_minutes};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(serde::Serialize)]
struct CsvOutRow<'a> {
    id: u64,
    date: String,
    clock_in: &'a str,
    lunch_out: &'a str,
    lunch_in: &'a str,
    clock_out: &'a str,
    worked_minutes: i64,
    expected_minutes: i64,
    balance_minutes: i64,
    worked: String,
    balance: String,
    valid: bool,
    issue: String,
    note: &'a str,
}

impl<'a> From<&'a EntryResult> for CsvOutRow<'a> {
    fn from(row: &'a EntryResult) -> Self {
        let entry = &row.entry;
        let eval = &row.evaluation;
        CsvOutRow {
            id: entry.id,
            date: entry.date.format("%Y-%m-%d").to_string(),
            clock_in: entry.clock_in.as_deref().unwrap_or(""),
            lunch_out: entry.lunch_out.as_deref().unwrap_or(""),
            lunch_in: entry.lunch_in.as_deref().unwrap_or(""),
            clock_out: entry.clock_out.as_deref().unwrap_or(""),
            worked_minutes: eval.worked_minutes,
            expected_minutes: eval.expected_minutes,
            balance_minutes: eval.balance_minutes,
            worked: format_minutes(eval.worked_minutes),
            balance: format_balance(eval.balance_minutes),
            valid: eval.valid,
            issue: eval
                .issue
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            note: &entry.note,
        }
    }
}

pub fn write_csv<W: Write>(w: W, report: &Report) -> Result<(), ExportError> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(w);
    for row in &report.entries {
        wtr.serialize(CsvOutRow::from(row))?;
    }
    wtr.flush()?;
    info!("Exported {} entries for {}", report.entries.len(), report.period);
    Ok(())
}

pub fn to_csv_string(report: &Report) -> Result<String, ExportError> {
    let mut out = Vec::new();
    write_csv(&mut out, report)?;
    Ok(String::from_utf8(out)?)
}
