// src/entry.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

pub type EntryId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("An entry already exists for {date} (id {existing})")]
    DuplicateDate { date: NaiveDate, existing: EntryId },
    #[error("No entry with id {0}")]
    UnknownEntry(EntryId),
    #[error("No entry ids left to assign")]
    IdsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Punch {
    ClockIn,
    LunchOut,
    LunchIn,
    ClockOut,
}

impl Punch {
    /// Punches in the order they must occur during the day.
    pub const ORDER: [Punch; 4] = [Punch::ClockIn, Punch::LunchOut, Punch::LunchIn, Punch::ClockOut];
}

impl fmt::Display for Punch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Punch::ClockIn => "clock-in",
            Punch::LunchOut => "lunch-out",
            Punch::LunchIn => "lunch-in",
            Punch::ClockOut => "clock-out",
        };
        f.write_str(name)
    }
}

/// One day's recorded punches, as entered. Punch text is kept raw so that
/// format problems can be reported per entry.
///
/// Ordering is by id first, then by the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub date: NaiveDate,
    #[serde(default)]
    pub clock_in: Option<String>,
    #[serde(default)]
    pub lunch_out: Option<String>,
    #[serde(default)]
    pub lunch_in: Option<String>,
    #[serde(default)]
    pub clock_out: Option<String>,
    #[serde(default)]
    pub note: String,
}

impl Entry {
    pub fn punch(&self, punch: Punch) -> Option<&str> {
        match punch {
            Punch::ClockIn => self.clock_in.as_deref(),
            Punch::LunchOut => self.lunch_out.as_deref(),
            Punch::LunchIn => self.lunch_in.as_deref(),
            Punch::ClockOut => self.clock_out.as_deref(),
        }
    }
}

/// An entry that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub clock_in: Option<String>,
    #[serde(default)]
    pub lunch_out: Option<String>,
    #[serde(default)]
    pub lunch_in: Option<String>,
    #[serde(default)]
    pub clock_out: Option<String>,
    #[serde(default)]
    pub note: String,
}

impl NewEntry {
    pub fn with_id(self, id: EntryId) -> Entry {
        Entry {
            id,
            date: self.date,
            clock_in: self.clock_in,
            lunch_out: self.lunch_out,
            lunch_in: self.lunch_in,
            clock_out: self.clock_out,
            note: self.note,
        }
    }
}

/// Entries keyed by date, at most one per date.
#[derive(Debug, Clone)]
pub struct EntryBook {
    by_date: BTreeMap<NaiveDate, Entry>,
    // None once u64::MAX has been handed out.
    next_id: Option<EntryId>,
}

/// An entry that lost its date to another one during [`EntryBook::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superseded {
    pub entry: Entry,
    pub by: EntryId,
}

impl Default for EntryBook {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryBook {
    pub fn new() -> Self {
        Self {
            by_date: BTreeMap::new(),
            next_id: Some(1),
        }
    }

    /// Builds a book from an arbitrary list. When several entries share a
    /// date, the one with the greatest id is kept; the rest are returned.
    /// Entries sharing both date and id are ranked by their punch text.
    pub fn resolve(entries: impl IntoIterator<Item = Entry>) -> (Self, Vec<Superseded>) {
        let mut book = Self::new();
        let mut superseded = Vec::new();

        for entry in entries {
            book.next_id = match (book.next_id, entry.id.checked_add(1)) {
                (Some(next), Some(after)) => Some(next.max(after)),
                _ => None,
            };
            match book.by_date.get(&entry.date) {
                Some(existing) if *existing >= entry => {
                    warn!(
                        "Entry {} on {} superseded by entry {}",
                        entry.id, entry.date, existing.id
                    );
                    let by = existing.id;
                    superseded.push(Superseded { entry, by });
                }
                _ => {
                    if let Some(previous) = book.by_date.insert(entry.date, entry.clone()) {
                        warn!(
                            "Entry {} on {} superseded by entry {}",
                            previous.id, previous.date, entry.id
                        );
                        superseded.push(Superseded {
                            entry: previous,
                            by: entry.id,
                        });
                    }
                }
            }
        }

        (book, superseded)
    }

    /// Adds a new entry, rejecting a second entry for the same date.
    pub fn insert(&mut self, new_entry: NewEntry) -> Result<EntryId, BookError> {
        if let Some(existing) = self.by_date.get(&new_entry.date) {
            return Err(BookError::DuplicateDate {
                date: new_entry.date,
                existing: existing.id,
            });
        }
        let id = self.next_id.ok_or(BookError::IdsExhausted)?;
        self.next_id = id.checked_add(1);
        info!("Recording entry {} for {}", id, new_entry.date);
        self.by_date.insert(new_entry.date, new_entry.with_id(id));
        Ok(id)
    }

    pub fn remove(&mut self, id: EntryId) -> Result<Entry, BookError> {
        let date = self
            .by_date
            .values()
            .find(|e| e.id == id)
            .map(|e| e.date)
            .ok_or(BookError::UnknownEntry(id))?;
        info!("Deleting entry {} for {}", id, date);
        self.by_date.remove(&date).ok_or(BookError::UnknownEntry(id))
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Entry> {
        self.by_date.get(&date)
    }

    /// Entries in ascending date order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.by_date.values()
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Entry> {
        self.by_date.values().cloned().collect()
    }
}
