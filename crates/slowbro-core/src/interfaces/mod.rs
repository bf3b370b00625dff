// crates/slowbro-core/src/interfaces/mod.rs
// ============================================================================
// Module: Slowbro Interfaces
// Description: Collaborator boundaries consumed by the orchestrator.
// Purpose: Define the contract surfaces for control plane, log, and digest access.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! Interfaces describe how the orchestrator reaches the remote control plane
//! and the log analysis tooling without embedding provider details.
//! Implementations classify every failure into a [`RemoteError`]; reads must
//! be side-effect free so they can be polled repeatedly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::EngineFamily;
use crate::core::InstanceId;
use crate::core::InstanceSnapshot;
use crate::core::ParameterGroupName;
use crate::core::RemoteError;

// ============================================================================
// SECTION: Instance State Reader
// ============================================================================

/// Reads the current observable state of a database instance.
#[async_trait]
pub trait InstanceStateReader: Send + Sync {
    /// Fetches a fresh snapshot of the instance.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] with [`crate::core::FaultKind::NotFound`] when
    /// the identifier does not resolve, or another kind for remote faults.
    async fn fetch(&self, instance_id: &InstanceId) -> Result<InstanceSnapshot, RemoteError>;
}

#[async_trait]
impl<T: InstanceStateReader + ?Sized> InstanceStateReader for Arc<T> {
    async fn fetch(&self, instance_id: &InstanceId) -> Result<InstanceSnapshot, RemoteError> {
        (**self).fetch(instance_id).await
    }
}

// ============================================================================
// SECTION: Parameter Group Manager
// ============================================================================

/// Result of a dedicated group creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCreated {
    /// The group was created by this call.
    Created,
    /// The group already existed (e.g. left behind by an earlier run).
    AlreadyExists,
}

/// Creates, attaches, writes, and deletes parameter groups.
#[async_trait]
pub trait ParameterGroupManager: Send + Sync {
    /// Creates a parameter group for the given family.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] for quota or other remote faults.
    async fn create_group(
        &self,
        name: &ParameterGroupName,
        family: &EngineFamily,
    ) -> Result<GroupCreated, RemoteError>;

    /// Requests that the instance use the given parameter group. Does not wait.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the modification is rejected.
    async fn attach_group(
        &self,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
    ) -> Result<(), RemoteError>;

    /// Writes all values in one call with immediate apply.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the write is rejected.
    async fn set_parameters(
        &self,
        name: &ParameterGroupName,
        values: &BTreeMap<String, String>,
    ) -> Result<(), RemoteError>;

    /// Deletes a parameter group.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when deletion fails; callers treat this as best-effort.
    async fn delete_group(&self, name: &ParameterGroupName) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: ParameterGroupManager + ?Sized> ParameterGroupManager for Arc<T> {
    async fn create_group(
        &self,
        name: &ParameterGroupName,
        family: &EngineFamily,
    ) -> Result<GroupCreated, RemoteError> {
        (**self).create_group(name, family).await
    }

    async fn attach_group(
        &self,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
    ) -> Result<(), RemoteError> {
        (**self).attach_group(instance_id, name).await
    }

    async fn set_parameters(
        &self,
        name: &ParameterGroupName,
        values: &BTreeMap<String, String>,
    ) -> Result<(), RemoteError> {
        (**self).set_parameters(name, values).await
    }

    async fn delete_group(&self, name: &ParameterGroupName) -> Result<(), RemoteError> {
        (**self).delete_group(name).await
    }
}

// ============================================================================
// SECTION: Log and Digest Boundary
// ============================================================================

/// Retrieves the raw slow-query log for an instance.
#[async_trait]
pub trait SlowLogSource: Send + Sync {
    /// Downloads the current slow-query log contents.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the log cannot be retrieved.
    async fn fetch_slow_log(&self, instance_id: &InstanceId) -> Result<Vec<u8>, RemoteError>;
}

#[async_trait]
impl<T: SlowLogSource + ?Sized> SlowLogSource for Arc<T> {
    async fn fetch_slow_log(&self, instance_id: &InstanceId) -> Result<Vec<u8>, RemoteError> {
        (**self).fetch_slow_log(instance_id).await
    }
}

/// Digest production errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// Analysis tool could not be obtained.
    #[error("digest tool unavailable: {0}")]
    Unavailable(String),
    /// Analysis tool failed or produced unusable output.
    #[error("digest tool failed: {0}")]
    Failed(String),
}

/// Turns raw log bytes into digest text.
///
/// Implementations must be deterministic: identical bytes yield identical text.
#[async_trait]
pub trait DigestProducer: Send + Sync {
    /// Produces the digest for one instance's log.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError`] when the analysis tool is missing or fails.
    async fn digest(&self, instance_id: &InstanceId, log: &[u8]) -> Result<String, DigestError>;
}

#[async_trait]
impl<T: DigestProducer + ?Sized> DigestProducer for Arc<T> {
    async fn digest(&self, instance_id: &InstanceId, log: &[u8]) -> Result<String, DigestError> {
        (**self).digest(instance_id, log).await
    }
}
