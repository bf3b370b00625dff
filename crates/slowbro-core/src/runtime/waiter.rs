// crates/slowbro-core/src/runtime/waiter.rs
// ============================================================================
// Module: Slowbro Apply Waiter
// Description: Fixed-interval convergence polling for remote modifications.
// Purpose: Block until an instance and its parameter group settle, or give up.
// Dependencies: crate::{core, interfaces}, tokio::time
// ============================================================================

//! ## Overview
//! The remote control plane offers no completion notification, so the
//! waiter re-fetches the instance on a fixed interval. Polling is bounded by
//! [`ConvergencePolicy::max_attempts`]; exhausting it reports a stuck
//! instance instead of hanging. A settle delay precedes the first poll because
//! a freshly modified instance may still report its previous status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

use crate::core::FaultKind;
use crate::core::InstanceId;
use crate::core::InstanceSnapshot;
use crate::core::RemoteError;
use crate::interfaces::InstanceStateReader;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Default delay before the first poll after a mutation.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);
/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default poll cap (15 minutes at the default interval).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 450;

/// Convergence polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergencePolicy {
    /// Delay before the first poll.
    pub settle_delay: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Maximum number of polls before the instance is reported stuck.
    pub max_attempts: u32,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Convergence wait failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The poll cap was reached without convergence.
    #[error(
        "instance {instance_id} did not converge after {attempts} polls (status {status}, \
         parameter apply status {apply_status})"
    )]
    Stuck {
        /// Instance that failed to converge.
        instance_id: InstanceId,
        /// Polls performed.
        attempts: u32,
        /// Last observed lifecycle status.
        status: String,
        /// Last observed parameter apply status.
        apply_status: String,
    },
    /// A non-transient remote fault ended polling.
    #[error(transparent)]
    Remote(RemoteError),
}

impl WaitError {
    /// Returns the fault classification for this failure.
    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        match self {
            Self::Stuck {
                ..
            } => FaultKind::InvalidState,
            Self::Remote(err) => err.kind,
        }
    }
}

// ============================================================================
// SECTION: Waiter
// ============================================================================

/// Polls an [`InstanceStateReader`] until convergence.
pub struct ApplyWaiter<'a, R: ?Sized> {
    /// Snapshot source.
    reader: &'a R,
    /// Polling policy.
    policy: ConvergencePolicy,
}

impl<'a, R: InstanceStateReader + ?Sized> ApplyWaiter<'a, R> {
    /// Creates a waiter over the given reader.
    #[must_use]
    pub const fn new(reader: &'a R, policy: ConvergencePolicy) -> Self {
        Self {
            reader,
            policy,
        }
    }

    /// Waits until the instance is no longer modifying and its parameter group
    /// is no longer applying, returning the converged snapshot.
    ///
    /// Transient fetch faults consume an attempt and polling continues.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Stuck`] when the poll cap is exhausted, or
    /// [`WaitError::Remote`] for a non-transient fetch fault.
    pub async fn wait_until_converged(
        &self,
        instance_id: &InstanceId,
    ) -> Result<InstanceSnapshot, WaitError> {
        tokio::time::sleep(self.policy.settle_delay).await;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut status = String::from("unknown");
        let mut apply_status = String::from("unknown");
        for attempt in 1 ..= max_attempts {
            match self.reader.fetch(instance_id).await {
                Ok(snapshot) if snapshot.is_converged() => return Ok(snapshot),
                Ok(snapshot) => {
                    status = snapshot.status;
                    apply_status = snapshot.parameter_apply_status;
                }
                Err(err) if err.kind == FaultKind::Transient => {}
                Err(err) => return Err(WaitError::Remote(err)),
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.policy.poll_interval).await;
            }
        }
        Err(WaitError::Stuck {
            instance_id: instance_id.clone(),
            attempts: max_attempts,
            status,
            apply_status,
        })
    }
}
