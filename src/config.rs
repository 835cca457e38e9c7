//! Simulator configuration loaded from environment variables.

use std::env;

use chrono::NaiveDate;
use thiserror::Error;

use crate::payment::DEFAULT_CURRENCY;

/// Errors for malformed configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: '{value}' is not a date (expected YYYY-MM-DD)")]
    InvalidDate { var: &'static str, value: String },

    #[error("{var}: '{value}' is not a rate between 0 and 1")]
    InvalidRate { var: &'static str, value: String },

    #[error("{var}: '{value}' is not a whole number of milliseconds")]
    InvalidDelay { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Settings for the `gym-sim` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Pin the payment clock to this date (`GYM_TODAY`). System clock if unset.
    pub today: Option<NaiveDate>,
    /// Currency written on ledger entries (`GYM_CURRENCY`).
    pub currency: String,
    /// Share of eligible charges to decline at random (`GYM_CHAOS_RATE`).
    /// Only honoured when built with the `chaos` feature.
    pub chaos_rate: Option<f64>,
    /// Processing delay recorded on each ledger entry (`GYM_DELAY_MS`).
    pub delay_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            today: None,
            currency: DEFAULT_CURRENCY.to_string(),
            chaos_rate: None,
            delay_ms: 0,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build from any variable lookup, so tests need not touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("GYM_TODAY") {
            let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidDate {
                    var: "GYM_TODAY",
                    value: value.clone(),
                }
            })?;
            config.today = Some(date);
        }

        if let Some(value) = lookup("GYM_CURRENCY") {
            let currency = value.trim();
            if currency.is_empty() {
                return Err(ConfigError::Empty {
                    var: "GYM_CURRENCY",
                });
            }
            config.currency = currency.to_uppercase();
        }

        if let Some(value) = lookup("GYM_CHAOS_RATE") {
            let rate = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|r| (0.0..=1.0).contains(r))
                .ok_or_else(|| ConfigError::InvalidRate {
                    var: "GYM_CHAOS_RATE",
                    value: value.clone(),
                })?;
            config.chaos_rate = Some(rate);
        }

        if let Some(value) = lookup("GYM_DELAY_MS") {
            let delay = value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidDelay {
                var: "GYM_DELAY_MS",
                value: value.clone(),
            })?;
            config.delay_ms = delay;
        }

        Ok(config)
    }
}
