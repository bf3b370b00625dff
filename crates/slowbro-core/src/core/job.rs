// crates/slowbro-core/src/core/job.rs
// ============================================================================
// Module: Slowbro Diagnostic Job
// Description: Validated input to one orchestration run.
// Purpose: Bind instance, remote context, sampling window, and restore state.
// Dependencies: crate::core::{identifiers, settings}, serde
// ============================================================================

//! ## Overview
//! A [`DiagnosticJob`] is created once per request and never changes during
//! the run. The sampling window is untrusted input; transports must bound it
//! before constructing a job.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::InstanceId;
use crate::core::settings::SlowQuerySettings;

// ============================================================================
// SECTION: Remote Context
// ============================================================================

/// Authentication and region context for the remote control plane.
///
/// # Invariants
/// - Opaque to the orchestrator; only adapters interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContext {
    /// Named credentials profile.
    #[serde(default)]
    pub profile: Option<String>,
    /// Region name.
    #[serde(default)]
    pub region: Option<String>,
}

// ============================================================================
// SECTION: Job
// ============================================================================

/// One diagnostic run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticJob {
    /// Target instance.
    pub instance_id: InstanceId,
    /// Remote authentication/region context.
    pub context: RemoteContext,
    /// How long to let queries accumulate once logging is on.
    pub sample_window: Duration,
    /// Logging state the instance had before the run; restored on revert and
    /// used for the threshold/destination of the cycle-off write.
    pub restore: SlowQuerySettings,
}
