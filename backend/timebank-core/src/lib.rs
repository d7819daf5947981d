//! timebank-core: turns daily clock punches and a work schedule into
//! worked/expected minutes, balances and cumulative balance series.
//!
//! The calculation itself ([`compute_report`]) is a pure function of
//! `(entries, config, period)`. Everything stateful lives in [`session`].

pub mod aggregator;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod entry;
pub mod evaluator;
pub mod export;
pub mod session;
pub mod source;


pub use aggregator::{compute_report, EntryResult, Report, SeriesPoint, Summary};
pub use calendar::{DayCode, Period, PeriodKind};
pub use clock::{format_balance, format_minutes, parse_minute_of_day, MinuteOfDay, TimeError};
pub use config::Config;
pub use entry::{Entry, EntryBook, EntryId, NewEntry, Punch};
pub use evaluator::{evaluate_entry, EntryEvaluation, EntryIssue};
