// src/source.rs
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::{fs, io::Read, path::Path};
use thiserror::Error;
use tracing::info;

use crate::entry::{Entry, EntryId};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Entries JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Entries CSV is invalid: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Deserialize)]
struct CsvRow {
    id: EntryId,
    date: NaiveDate,
    clock_in: Option<String>,
    lunch_out: Option<String>,
    lunch_in: Option<String>,
    clock_out: Option<String>,
    note: Option<String>,
}

impl From<CsvRow> for Entry {
    fn from(row: CsvRow) -> Self {
        Entry {
            id: row.id,
            date: row.date,
            clock_in: row.clock_in,
            lunch_out: row.lunch_out,
            lunch_in: row.lunch_in,
            clock_out: row.clock_out,
            note: row.note.unwrap_or_default(),
        }
    }
}

/// Reads a JSON array of entries.
pub fn read_json<R: Read>(r: R) -> Result<Vec<Entry>, SourceError> {
    Ok(serde_json::from_reader(r)?)
}

/// Reads entries from CSV with headers `id,date,clock_in,lunch_out,lunch_in,clock_out,note`.
/// Missing trailing columns and empty cells are treated as absent punches.
pub fn read_csv<R: Read>(r: R) -> Result<Vec<Entry>, SourceError> {
    let mut rdr = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(r);
    let mut entries = Vec::new();
    for rec in rdr.deserialize::<CsvRow>() {
        entries.push(rec?.into());
    }
    Ok(entries)
}

/// Loads entries from a file, choosing CSV for `.csv` and JSON otherwise.
pub fn load_entries(path: impl AsRef<Path>) -> Result<Vec<Entry>, SourceError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    let entries = if is_csv { read_csv(file)? } else { read_json(file)? };
    info!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}
