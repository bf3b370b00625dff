// crates/slowbro-core/src/core/settings.rs
// ============================================================================
// Module: Slowbro Slow Query Settings
// Description: The three slow-query logging parameters written as one unit.
// Purpose: Render logging state into parameter-group key/value pairs.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Slow-query logging is controlled by `slow_query_log`, `long_query_time`,
//! and `log_output`. They are always written together so logging is never on
//! with a stale threshold or destination.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Parameter Names
// ============================================================================

/// Parameter toggling slow-query logging.
pub const PARAM_SLOW_QUERY_LOG: &str = "slow_query_log";
/// Parameter holding the slow-query threshold in seconds.
pub const PARAM_LONG_QUERY_TIME: &str = "long_query_time";
/// Parameter selecting the log destination.
pub const PARAM_LOG_OUTPUT: &str = "log_output";

/// Largest threshold the engine accepts, in seconds (one year).
pub const MAX_LONG_QUERY_TIME_SECONDS: f64 = 31_536_000.0;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Settings parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Toggle value was not recognized.
    #[error("invalid slow query toggle {0:?} (expected on/off, true/false, or 1/0)")]
    Toggle(String),
    /// Log output destination was not recognized.
    #[error("invalid log output {0:?} (expected FILE, TABLE, or NONE)")]
    LogOutput(String),
    /// Threshold was not a plain decimal within the engine's range.
    #[error("invalid long query time {0:?} (expected a plain decimal from 0 to 31536000 seconds)")]
    LongQueryTime(String),
}

// ============================================================================
// SECTION: Log Output
// ============================================================================

/// Slow-query log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogOutput {
    /// Engine log file (required for log download).
    File,
    /// `mysql.slow_log` table.
    Table,
    /// Logging disabled at the destination level.
    None,
}

impl LogOutput {
    /// Returns the parameter value for the destination.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::Table => "TABLE",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogOutput {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FILE" => Ok(Self::File),
            "TABLE" => Ok(Self::Table),
            "NONE" => Ok(Self::None),
            _ => Err(SettingsError::LogOutput(value.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Slow-query logging state written to a parameter group.
///
/// # Invariants
/// - `long_query_time` is a plain decimal (`digits[.digits]`) no greater than
///   [`MAX_LONG_QUERY_TIME_SECONDS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowQuerySettings {
    /// Whether slow-query logging is enabled.
    pub enabled: bool,
    /// Threshold in seconds, kept as the decimal string sent to the engine.
    pub long_query_time: String,
    /// Log destination.
    pub log_output: LogOutput,
}

impl SlowQuerySettings {
    /// Builds validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the threshold is not a plain decimal in range.
    pub fn new(
        enabled: bool,
        long_query_time: impl Into<String>,
        log_output: LogOutput,
    ) -> Result<Self, SettingsError> {
        let long_query_time = long_query_time.into().trim().to_string();
        if !is_plain_decimal(&long_query_time) {
            return Err(SettingsError::LongQueryTime(long_query_time));
        }
        match long_query_time.parse::<f64>() {
            Ok(value) if value <= MAX_LONG_QUERY_TIME_SECONDS => {}
            _ => return Err(SettingsError::LongQueryTime(long_query_time)),
        }
        Ok(Self {
            enabled,
            long_query_time,
            log_output,
        })
    }

    /// Settings that capture every query into the log file.
    #[must_use]
    pub fn capture_all() -> Self {
        Self {
            enabled: true,
            long_query_time: "0".to_string(),
            log_output: LogOutput::File,
        }
    }

    /// Returns these settings with logging switched off.
    #[must_use]
    pub fn disabled(&self) -> Self {
        Self {
            enabled: false,
            ..self.clone()
        }
    }

    /// Renders the settings as parameter name/value pairs.
    #[must_use]
    pub fn to_parameters(&self) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            PARAM_SLOW_QUERY_LOG.to_string(),
            if self.enabled { "1" } else { "0" }.to_string(),
        );
        parameters.insert(PARAM_LONG_QUERY_TIME.to_string(), self.long_query_time.clone());
        parameters.insert(PARAM_LOG_OUTPUT.to_string(), self.log_output.as_str().to_string());
        parameters
    }
}

/// Returns true for `digits` or `digits.digits`; signs and exponents are rejected.
fn is_plain_decimal(value: &str) -> bool {
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit());
    digits(whole) && fraction.is_none_or(digits)
}

/// Parses a slow-query toggle as accepted from operators.
///
/// # Errors
///
/// Returns [`SettingsError::Toggle`] for unrecognized values.
pub fn parse_toggle(value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" => Ok(true),
        "0" | "off" | "false" => Ok(false),
        _ => Err(SettingsError::Toggle(value.to_string())),
    }
}
