// crates/slowbro-core/src/core/fault.rs
// ============================================================================
// Module: Slowbro Remote Faults
// Description: Classified failures returned by the remote control plane.
// Purpose: Let the orchestrator decide between absorbing and aborting.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Adapters translate every remote failure into a [`RemoteError`] with a
//! [`FaultKind`]. The orchestrator never inspects provider-specific codes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Fault Kind
// ============================================================================

/// Remote fault classification.
///
/// # Invariants
/// - Variants are stable for programmatic handling and audit labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Instance or parameter group does not exist.
    NotFound,
    /// Resource already exists.
    AlreadyExists,
    /// Target is mid-transition.
    InvalidState,
    /// Account quota reached.
    QuotaExceeded,
    /// Network, throttling, or service-side fault.
    Transient,
    /// Any other rejection.
    Other,
}

impl FaultKind {
    /// Returns a stable label for the fault kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidState => "invalid_state",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Transient => "transient",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Remote Operation
// ============================================================================

/// Remote operation that produced a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOperation {
    /// Describe an instance.
    DescribeInstance,
    /// Create a parameter group.
    CreateGroup,
    /// Attach a parameter group to an instance.
    AttachGroup,
    /// Write parameter values.
    SetParameters,
    /// Delete a parameter group.
    DeleteGroup,
    /// Download the slow-query log.
    DownloadLog,
}

impl RemoteOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DescribeInstance => "describe_instance",
            Self::CreateGroup => "create_group",
            Self::AttachGroup => "attach_group",
            Self::SetParameters => "set_parameters",
            Self::DeleteGroup => "delete_group",
            Self::DownloadLog => "download_log",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Remote Error
// ============================================================================

/// A classified remote failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{operation} failed ({kind}): {message}")]
pub struct RemoteError {
    /// Operation that failed.
    pub operation: RemoteOperation,
    /// Fault classification.
    pub kind: FaultKind,
    /// Provider message.
    pub message: String,
}

impl RemoteError {
    /// Creates a new remote error.
    #[must_use]
    pub fn new(operation: RemoteOperation, kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }
}
