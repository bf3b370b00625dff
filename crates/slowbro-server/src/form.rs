// crates/slowbro-server/src/form.rs
// ============================================================================
// Module: Diagnostic Request Form
// Description: Wire format and validation of diagnostic requests.
// Purpose: Turn untrusted request bodies into validated diagnostic jobs.
// Dependencies: slowbro-core, serde
// ============================================================================

//! ## Overview
//! The request body mirrors the web form that drives the service. All values
//! are validated before a job is built; nothing reaches the orchestrator
//! unless every field is acceptable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use slowbro_core::DiagnosticJob;
use slowbro_core::IdentifierError;
use slowbro_core::InstanceId;
use slowbro_core::LogOutput;
use slowbro_core::RemoteContext;
use slowbro_core::SettingsError;
use slowbro_core::SlowQuerySettings;
use slowbro_core::parse_toggle;
use thiserror::Error;

// ============================================================================
// SECTION: Form
// ============================================================================

/// Diagnostic request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuneForm {
    /// Instance identifier.
    pub identifier: String,
    /// Named credentials profile; empty means the default chain.
    #[serde(default)]
    pub profile: Option<String>,
    /// Region name; empty means the default chain.
    #[serde(default)]
    pub region: Option<String>,
    /// Slow-query logging state to restore (`on`/`off`, `true`/`false`, `1`/`0`).
    pub slow_query_toggle: String,
    /// Log destination to restore (`FILE`, `TABLE`, `NONE`).
    pub log_type: String,
    /// Sample window in seconds.
    pub sample_time: u64,
    /// Threshold in seconds to restore.
    pub long_query_time: String,
}

impl TuneForm {
    /// Validates the form into a diagnostic job.
    ///
    /// # Errors
    ///
    /// Returns [`FormError`] naming the first invalid field.
    pub fn into_job(self, max_sample_seconds: u64) -> Result<DiagnosticJob, FormError> {
        let instance_id = InstanceId::new(self.identifier)?;
        if self.sample_time == 0 || self.sample_time > max_sample_seconds {
            return Err(FormError::SampleTime {
                max: max_sample_seconds,
            });
        }
        let enabled = parse_toggle(&self.slow_query_toggle)?;
        let log_output: LogOutput = self.log_type.parse()?;
        let restore = SlowQuerySettings::new(enabled, self.long_query_time, log_output)?;
        Ok(DiagnosticJob {
            instance_id,
            context: RemoteContext {
                profile: non_empty(self.profile),
                region: non_empty(self.region),
            },
            sample_window: Duration::from_secs(self.sample_time),
            restore,
        })
    }
}

/// Treats blank strings as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// Identifier failed validation.
    #[error("identifier: {0}")]
    Identifier(#[from] IdentifierError),
    /// Sample window outside the accepted range.
    #[error("sampleTime must be between 1 and {max} seconds")]
    SampleTime {
        /// Largest accepted window.
        max: u64,
    },
    /// Logging settings failed validation.
    #[error("{0}")]
    Settings(#[from] SettingsError),
}
