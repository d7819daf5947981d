// src/clock.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MINUTES_PER_HOUR: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid time format '{input}': {detail}")]
    InvalidTimeFormat { input: String, detail: &'static str },
}

impl TimeError {
    fn invalid(input: &str, detail: &'static str) -> Self {
        TimeError::InvalidTimeFormat {
            input: input.to_string(),
            detail,
        }
    }
}

/// A clock time expressed as minutes since midnight, always in `0..1440`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteOfDay(u32);

impl MinuteOfDay {
    pub const MIDNIGHT: Self = Self(0);

    pub fn new(minutes: u32) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour >= 24 || minute >= MINUTES_PER_HOUR {
            return None;
        }
        Some(Self(hour * MINUTES_PER_HOUR + minute))
    }

    pub fn minutes(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_minutes(i64::from(self.0)))
    }
}

impl FromStr for MinuteOfDay {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_minute_of_day(s)
    }
}

impl Serialize for MinuteOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinuteOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses an `HH:MM` clock time. Surrounding whitespace is ignored.
pub fn parse_minute_of_day(text: &str) -> Result<MinuteOfDay, TimeError> {
    let trimmed = text.trim();
    let (hour_part, minute_part) = trimmed
        .split_once(':')
        .ok_or_else(|| TimeError::invalid(text, "expected HH:MM"))?;

    let hour = parse_component(text, hour_part)?;
    let minute = parse_component(text, minute_part)?;

    if hour > 23 {
        return Err(TimeError::invalid(text, "hour must be between 0 and 23"));
    }
    if minute > 59 {
        return Err(TimeError::invalid(text, "minute must be between 0 and 59"));
    }

    MinuteOfDay::from_hm(hour, minute).ok_or_else(|| TimeError::invalid(text, "expected HH:MM"))
}

fn parse_component(input: &str, part: &str) -> Result<u32, TimeError> {
    // Rejects signs, inner whitespace and a second colon ("08:30:00").
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeError::invalid(input, "expected HH:MM"));
    }
    part.parse::<u32>()
        .map_err(|_| TimeError::invalid(input, "number too large"))
}

/// Parses an optional punch. Absent or blank text means "no punch" and is not an error.
pub fn parse_punch(text: Option<&str>) -> Result<Option<MinuteOfDay>, TimeError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) => parse_minute_of_day(t).map(Some),
    }
}

/// Renders a minute count as `HH:MM`. Hours are not wrapped at 24, so the
/// same function renders both clock times and durations.
pub fn format_minutes(minutes: i64) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let magnitude = minutes.unsigned_abs();
    let per_hour = u64::from(MINUTES_PER_HOUR);
    format!(
        "{}{:02}:{:02}",
        sign,
        magnitude / per_hour,
        magnitude % per_hour
    )
}

/// Like [`format_minutes`] but always signed, e.g. `+01:15` or `-00:30`.
pub fn format_balance(minutes: i64) -> String {
    if minutes < 0 {
        format_minutes(minutes)
    } else {
        format!("+{}", format_minutes(minutes))
    }
}

#[cfg(test)]
mod clock_tests {
    use super::*;

    fn m(text: &str) -> u32 {
        parse_minute_of_day(text)
            .unwrap_or_else(|e| panic!("'{}' should parse: {}", text, e))
            .minutes()
    }

    #[test]
    fn parses_well_formed_times() {
        assert_eq!(m("08:30"), 510);
        assert_eq!(m("18:00"), 1080);
        assert_eq!(m("00:00"), 0);
        assert_eq!(m("23:59"), 1439);
        assert_eq!(m(" 9:05 "), 545);
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert!(parse_minute_of_day("24:00").is_err());
        assert!(parse_minute_of_day("12:60").is_err());
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in ["0830", "8:", ":30", "ab:cd", "08:30:00", "-1:30", "08 :30", "+8:30"] {
            let err = parse_minute_of_day(bad).expect_err(bad);
            assert!(
                matches!(err, TimeError::InvalidTimeFormat { ref input, .. } if input == bad),
                "unexpected error for '{}': {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn blank_punch_is_not_an_error() {
        assert_eq!(parse_punch(None), Ok(None));
        assert_eq!(parse_punch(Some("")), Ok(None));
        assert_eq!(parse_punch(Some("   ")), Ok(None));
        assert_eq!(parse_punch(Some("12:00")).map(|p| p.map(MinuteOfDay::minutes)), Ok(Some(720)));
        assert!(parse_punch(Some("noon")).is_err());
    }

    #[test]
    fn formats_minutes_as_clock_text() {
        assert_eq!(format_minutes(510), "08:30");
        assert_eq!(format_minutes(1080), "18:00");
        assert_eq!(format_minutes(0), "00:00");
        assert_eq!(format_minutes(1500), "25:00");
        assert_eq!(format_minutes(-30), "-00:30");
    }

    #[test]
    fn format_is_inverse_of_parse_for_clock_times() {
        for minutes in [0, 1, 59, 60, 510, 725, 1439] {
            let text = format_minutes(i64::from(minutes));
            assert_eq!(m(&text), minutes, "round trip through '{}'", text);
        }
    }

    #[test]
    fn balance_formatting_is_sign_aware() {
        assert_eq!(format_balance(75), "+01:15");
        assert_eq!(format_balance(0), "+00:00");
        assert_eq!(format_balance(-480), "-08:00");
    }

    #[test]
    fn minute_of_day_serializes_as_text() {
        let t = MinuteOfDay::from_hm(8, 30).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"08:30\"");
        let back: MinuteOfDay = serde_json::from_str("\"18:00\"").unwrap();
        assert_eq!(back.minutes(), 1080);
        assert!(serde_json::from_str::<MinuteOfDay>("\"25:00\"").is_err());
    }
}
