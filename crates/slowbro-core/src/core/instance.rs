// crates/slowbro-core/src/core/instance.rs
// ============================================================================
// Module: Slowbro Instance Snapshot
// Description: Point-in-time observation of a database instance.
// Purpose: Carry the remote state the orchestrator branches and waits on.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! An [`InstanceSnapshot`] is immutable once built. New remote state is
//! observed by fetching a fresh snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EngineFamily;
use crate::core::identifiers::IdentifierError;
use crate::core::identifiers::InstanceId;
use crate::core::identifiers::ParameterGroupName;

// ============================================================================
// SECTION: Status Labels
// ============================================================================

/// Instance lifecycle status while a modification is in flight.
pub const STATUS_MODIFYING: &str = "modifying";
/// Instance lifecycle status when idle.
pub const STATUS_AVAILABLE: &str = "available";
/// Parameter group apply status while changes are being applied.
pub const APPLY_STATUS_APPLYING: &str = "applying";
/// Parameter group apply status when settled.
pub const APPLY_STATUS_IN_SYNC: &str = "in-sync";

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Observed state of one database instance and its attached parameter group.
///
/// # Invariants
/// - `family` is always derived from `engine` and `engine_version`.
/// - Snapshots are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// Engine name (e.g. `mysql`).
    pub engine: String,
    /// Full engine version (e.g. `5.7.34`).
    pub engine_version: String,
    /// Currently attached parameter group.
    pub parameter_group: ParameterGroupName,
    /// Parameter group family derived from engine and version.
    pub family: EngineFamily,
    /// Instance lifecycle status.
    pub status: String,
    /// Apply status of the attached parameter group.
    pub parameter_apply_status: String,
}

impl InstanceSnapshot {
    /// Builds a snapshot, deriving the parameter group family.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the engine or version cannot yield a family.
    pub fn new(
        instance_id: InstanceId,
        engine: impl Into<String>,
        engine_version: impl Into<String>,
        parameter_group: ParameterGroupName,
        status: impl Into<String>,
        parameter_apply_status: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        let engine = engine.into();
        let engine_version = engine_version.into();
        let family = EngineFamily::derive(&engine, &engine_version)?;
        Ok(Self {
            instance_id,
            engine,
            engine_version,
            parameter_group,
            family,
            status: status.into(),
            parameter_apply_status: parameter_apply_status.into(),
        })
    }

    /// Returns true when no instance modification or parameter apply is pending.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.status != STATUS_MODIFYING && self.parameter_apply_status != APPLY_STATUS_APPLYING
    }
}
