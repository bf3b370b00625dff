// crates/slowbro-rds/src/lib.rs
// ============================================================================
// Module: Slowbro RDS Adapter
// Description: AWS RDS implementation of the orchestrator's remote boundaries.
// Purpose: Describe instances, manage parameter groups, and download logs.
// Dependencies: slowbro-core, aws-config, aws-sdk-rds
// ============================================================================

//! ## Overview
//! [`RdsControlPlane`] implements the instance reader, parameter group
//! manager, and slow-log source against the RDS API. Provider errors are
//! classified into [`slowbro_core::FaultKind`] so the orchestrator can decide
//! between absorbing, retrying, and aborting.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod classify;
pub mod client;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use classify::classify_code;
pub use client::DEFAULT_LOG_FILE_NAME;
pub use client::DEFAULT_MAX_LOG_BYTES;
pub use client::RdsControlPlane;
pub use client::RdsSettings;
