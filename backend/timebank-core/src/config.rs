// src/config.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fs, path::Path};
use thiserror::Error;
use tracing::{debug, info};

use crate::calendar::DayCode;
use crate::clock::MinuteOfDay;

pub const ENV_PREFIX: &str = "TIMEBANK_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Config JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config environment is invalid: {0}")]
    Env(#[from] envy::Error),
    #[error("Rounding granularity must be greater than zero")]
    ZeroRounding,
    #[error("Default clock-out {clock_out} is before default clock-in {clock_in}")]
    DefaultsOutOfOrder {
        clock_in: MinuteOfDay,
        clock_out: MinuteOfDay,
    },
}

/// Work schedule settings. Immutable for the duration of a calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub expected_daily_minutes: u32,
    // Entry-form defaults only; the engine never reads these.
    pub default_clock_in: MinuteOfDay,
    pub default_clock_out: MinuteOfDay,
    pub default_lunch_minutes: u32,
    pub count_absence_as_debit: bool,
    pub business_days: BTreeSet<DayCode>,
    pub rounding_minutes: Option<u32>,
    /// Dates that are never business days, whatever their weekday.
    pub holidays: BTreeSet<NaiveDate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expected_daily_minutes: 480,
            default_clock_in: MinuteOfDay::from_hm(8, 30).unwrap_or(MinuteOfDay::MIDNIGHT),
            default_clock_out: MinuteOfDay::from_hm(18, 0).unwrap_or(MinuteOfDay::MIDNIGHT),
            default_lunch_minutes: 90,
            count_absence_as_debit: false,
            business_days: DayCode::WORKWEEK.into_iter().collect(),
            rounding_minutes: None,
            holidays: BTreeSet::new(),
        }
    }
}

impl Config {
    /// Reads `TIMEBANK_*` variables, after loading a `.env` file if one exists.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let config = Self::from_vars(std::env::vars())?;
        info!("Loaded configuration from environment");
        Ok(config)
    }

    /// Same as [`Config::from_env`] over an explicit set of variables.
    /// Sets are comma separated (`TIMEBANK_BUSINESS_DAYS=mon,wed`). A blank
    /// value counts as unset, so `TIMEBANK_HOLIDAYS=` gives no holidays.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = vars.into_iter().filter(|(_, value)| !value.trim().is_empty());
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, Config>(vars)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounding_minutes == Some(0) {
            return Err(ConfigError::ZeroRounding);
        }
        if self.default_clock_out < self.default_clock_in {
            return Err(ConfigError::DefaultsOutOfOrder {
                clock_in: self.default_clock_in,
                clock_out: self.default_clock_out,
            });
        }
        debug!("Configuration validated: {:?}", self);
        Ok(())
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        self.business_days.contains(&DayCode::of(date)) && !self.holidays.contains(&date)
    }

    /// Rounding granularity, with `Some(0)` treated as no rounding.
    pub fn rounding(&self) -> Option<u32> {
        self.rounding_minutes.filter(|g| *g > 0)
    }
}
