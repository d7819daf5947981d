// src/evaluator.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::{parse_punch, MinuteOfDay, TimeError};
use crate::config::Config;
use crate::entry::{Entry, EntryId, Punch};

// --- Per-entry diagnostics ---

/// Why an entry does not count as worked time. Carried as data in results;
/// the engine never fails a whole calculation because of one entry.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryIssue {
    #[error("Invalid {punch} time '{input}'")]
    InvalidTimeFormat { punch: Punch, input: String },
    #[error("Missing {punch} punch")]
    MissingPunch { punch: Punch },
    #[error("{later} ({later_time}) is before {earlier} ({earlier_time})")]
    OutOfOrder {
        earlier: Punch,
        earlier_time: MinuteOfDay,
        later: Punch,
        later_time: MinuteOfDay,
    },
    #[error("Superseded by entry {by} on the same date")]
    Superseded { by: EntryId },
}

// --- Validated punches ---

/// The four punches of a valid entry, in non-decreasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PunchSet {
    pub clock_in: MinuteOfDay,
    pub lunch_out: MinuteOfDay,
    pub lunch_in: MinuteOfDay,
    pub clock_out: MinuteOfDay,
}

impl PunchSet {
    /// Morning segment plus afternoon segment, before rounding. Never negative
    /// because the punches are ordered.
    pub fn worked_minutes(&self) -> i64 {
        let morning = i64::from(self.lunch_out.minutes()) - i64::from(self.clock_in.minutes());
        let afternoon = i64::from(self.clock_out.minutes()) - i64::from(self.lunch_in.minutes());
        morning + afternoon
    }
}

/// Parses all four punches and checks `clock_in <= lunch_out <= lunch_in <= clock_out`.
/// Reports the first problem found, walking the punches in day order.
pub fn validate_punches(entry: &Entry) -> Result<PunchSet, EntryIssue> {
    let mut times = [MinuteOfDay::MIDNIGHT; 4];

    for (slot, punch) in times.iter_mut().zip(Punch::ORDER) {
        let raw = entry.punch(punch);
        *slot = match parse_punch(raw) {
            Ok(Some(t)) => t,
            Ok(None) => return Err(EntryIssue::MissingPunch { punch }),
            Err(TimeError::InvalidTimeFormat { input, .. }) => {
                return Err(EntryIssue::InvalidTimeFormat { punch, input })
            }
        };
    }

    for i in 1..times.len() {
        if times[i] < times[i - 1] {
            return Err(EntryIssue::OutOfOrder {
                earlier: Punch::ORDER[i - 1],
                earlier_time: times[i - 1],
                later: Punch::ORDER[i],
                later_time: times[i],
            });
        }
    }

    let [clock_in, lunch_out, lunch_in, clock_out] = times;
    Ok(PunchSet {
        clock_in,
        lunch_out,
        lunch_in,
        clock_out,
    })
}

// --- Minute arithmetic ---

/// Rounds to the nearest multiple of `granularity`. A remainder of exactly
/// half rounds away from zero. `None` or `Some(0)` leaves the value unchanged.
pub fn round_minutes(minutes: i64, granularity: Option<u32>) -> i64 {
    let step = match granularity {
        Some(g) if g > 0 => i64::from(g),
        _ => return minutes,
    };
    let magnitude = minutes.abs();
    let remainder = magnitude % step;
    let rounded = if remainder * 2 >= step {
        magnitude + (step - remainder)
    } else {
        magnitude - remainder
    };
    rounded * minutes.signum()
}

/// Target minutes for `date`: the daily target on business days, else zero.
pub fn expected_minutes(date: NaiveDate, config: &Config) -> i64 {
    if config.is_business_day(date) {
        i64::from(config.expected_daily_minutes)
    } else {
        0
    }
}

/// Balance of a date without a counted entry: minus the daily target when
/// absences are debited on a business day, else zero.
pub fn absence_minutes(date: NaiveDate, config: &Config) -> i64 {
    if config.count_absence_as_debit {
        -expected_minutes(date, config)
    } else {
        0
    }
}

// --- Evaluation ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryEvaluation {
    pub worked_minutes: i64,
    pub expected_minutes: i64,
    pub balance_minutes: i64,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<EntryIssue>,
}

impl EntryEvaluation {
    /// Result for an entry that lost its date to another entry. It neither
    /// works nor debits; the winning entry accounts for the date.
    pub fn superseded(date: NaiveDate, config: &Config, by: EntryId) -> Self {
        Self {
            worked_minutes: 0,
            expected_minutes: expected_minutes(date, config),
            balance_minutes: 0,
            valid: false,
            issue: Some(EntryIssue::Superseded { by }),
        }
    }
}

pub fn evaluate_entry(entry: &Entry, config: &Config) -> EntryEvaluation {
    let expected = expected_minutes(entry.date, config);

    match validate_punches(entry) {
        Ok(punches) => {
            let raw = punches.worked_minutes();
            let worked = round_minutes(raw, config.rounding());
            let balance = worked - expected;
            debug!(
                "Entry {} on {}: worked {} (raw {}), expected {}, balance {}",
                entry.id, entry.date, worked, raw, expected, balance
            );
            EntryEvaluation {
                worked_minutes: worked,
                expected_minutes: expected,
                balance_minutes: balance,
                valid: true,
                issue: None,
            }
        }
        Err(issue) => {
            warn!("Entry {} on {} is invalid: {}", entry.id, entry.date, issue);
            EntryEvaluation {
                worked_minutes: 0,
                expected_minutes: expected,
                balance_minutes: absence_minutes(entry.date, config),
                valid: false,
                issue: Some(issue),
            }
        }
    }
}
