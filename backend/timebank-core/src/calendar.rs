// src/calendar.rs
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Date calculation overflow around {0}")]
    DateOverflow(NaiveDate),
}

/// Weekday codes as they appear in configuration (`mon`, `tue`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayCode {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayCode {
    pub const WORKWEEK: [DayCode; 5] = [
        DayCode::Mon,
        DayCode::Tue,
        DayCode::Wed,
        DayCode::Thu,
        DayCode::Fri,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }
}

impl From<Weekday> for DayCode {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayCode::Mon,
            Weekday::Tue => DayCode::Tue,
            Weekday::Wed => DayCode::Wed,
            Weekday::Thu => DayCode::Thu,
            Weekday::Fri => DayCode::Fri,
            Weekday::Sat => DayCode::Sat,
            Weekday::Sun => DayCode::Sun,
        }
    }
}

impl fmt::Display for DayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            DayCode::Mon => "mon",
            DayCode::Tue => "tue",
            DayCode::Wed => "wed",
            DayCode::Thu => "thu",
            DayCode::Fri => "fri",
            DayCode::Sat => "sat",
            DayCode::Sun => "sun",
        };
        f.write_str(code)
    }
}

/// Every date in `[start, end]`, ascending. Empty when `start > end`.
pub fn dates_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Day,
    Week,
    Month,
    Range,
}

/// A closed date interval. `kind` records how the bounds were chosen and has
/// no effect on calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub kind: PeriodKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            kind: PeriodKind::Day,
            start: date,
            end: date,
        }
    }

    /// The ISO week (Monday to Sunday) containing `date`.
    pub fn week_of(date: NaiveDate) -> Result<Self, PeriodError> {
        let offset = u64::from(date.weekday().num_days_from_monday());
        let start = date
            .checked_sub_days(Days::new(offset))
            .ok_or(PeriodError::DateOverflow(date))?;
        let end = start
            .checked_add_days(Days::new(6))
            .ok_or(PeriodError::DateOverflow(date))?;
        Ok(Self {
            kind: PeriodKind::Week,
            start,
            end,
        })
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Result<Self, PeriodError> {
        let start = first_of_month(date)?;
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or(PeriodError::DateOverflow(date))?;
        Ok(Self {
            kind: PeriodKind::Month,
            start,
            end,
        })
    }

    /// From the first of `today`'s month up to and including `today`.
    pub fn month_to_date(today: NaiveDate) -> Result<Self, PeriodError> {
        Ok(Self {
            kind: PeriodKind::Month,
            start: first_of_month(today)?,
            end: today,
        })
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            kind: PeriodKind::Range,
            start,
            end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        dates_in_range(self.start, self.end)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}..={}", self.kind, self.start, self.end)
    }
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate, PeriodError> {
    date.with_day(1).ok_or(PeriodError::DateOverflow(date))
}
