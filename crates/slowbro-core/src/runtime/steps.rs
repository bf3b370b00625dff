// crates/slowbro-core/src/runtime/steps.rs
// ============================================================================
// Module: Slowbro Group Mutations
// Description: Remote state changes paired with convergence waits.
// Purpose: Share attach/write/wait handling between forward and revert paths.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`GroupMutator`] issues parameter-group mutations and waits for them to
//! converge. An `InvalidState` rejection means the target is mid-transition
//! and a `Transient` fault means the service hiccupped: in both cases the
//! mutator waits for convergence and re-issues the call, up to the configured
//! retry count, before reporting the fault. Deleting a just-detached group
//! follows the same policy, since the service may still report it in use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::FaultKind;
use crate::core::InstanceId;
use crate::core::InstanceSnapshot;
use crate::core::ParameterGroupName;
use crate::core::RemoteError;
use crate::interfaces::InstanceStateReader;
use crate::interfaces::ParameterGroupManager;
use crate::runtime::audit::EventOutcome;
use crate::runtime::audit::RunAuditSink;
use crate::runtime::audit::RunEvent;
use crate::runtime::orchestrator::RunStage;
use crate::runtime::orchestrator::StepFault;
use crate::runtime::waiter::ApplyWaiter;
use crate::runtime::waiter::ConvergencePolicy;

// ============================================================================
// SECTION: Mutator
// ============================================================================

/// Issues parameter-group mutations with convergence handling.
pub struct GroupMutator<'a, R: ?Sized, G: ?Sized> {
    /// Snapshot source used for convergence polling.
    reader: &'a R,
    /// Parameter group manager.
    groups: &'a G,
    /// Convergence polling policy.
    policy: ConvergencePolicy,
    /// Re-issues allowed after a retryable rejection.
    retries: u32,
    /// Audit sink for absorbed faults.
    audit: &'a dyn RunAuditSink,
}

impl<'a, R, G> GroupMutator<'a, R, G>
where
    R: InstanceStateReader + ?Sized,
    G: ParameterGroupManager + ?Sized,
{
    /// Creates a mutator over the given collaborators.
    #[must_use]
    pub const fn new(
        reader: &'a R,
        groups: &'a G,
        policy: ConvergencePolicy,
        retries: u32,
        audit: &'a dyn RunAuditSink,
    ) -> Self {
        Self {
            reader,
            groups,
            policy,
            retries,
            audit,
        }
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit(&self) -> &'a dyn RunAuditSink {
        self.audit
    }

    /// Waits for the instance to converge.
    ///
    /// # Errors
    ///
    /// Returns [`StepFault::Wait`] when polling fails or is exhausted.
    pub async fn wait(&self, instance_id: &InstanceId) -> Result<InstanceSnapshot, StepFault> {
        ApplyWaiter::new(self.reader, self.policy)
            .wait_until_converged(instance_id)
            .await
            .map_err(StepFault::Wait)
    }

    /// Attaches a parameter group, retrying through convergence on retryable faults.
    ///
    /// # Errors
    ///
    /// Returns [`StepFault`] when the attach is rejected or retries are exhausted.
    pub async fn attach(
        &self,
        stage: RunStage,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
    ) -> Result<(), StepFault> {
        let mut retries = 0;
        loop {
            match self.groups.attach_group(instance_id, name).await {
                Ok(()) => return Ok(()),
                Err(err) if self.should_retry(&err, retries) => {
                    retries += 1;
                    self.note_retry(stage, instance_id, &err, retries);
                    self.wait(instance_id).await?;
                }
                Err(err) => return Err(StepFault::Remote(err)),
            }
        }
    }

    /// Writes parameter values, retrying through convergence on retryable faults.
    ///
    /// # Errors
    ///
    /// Returns [`StepFault`] when the write is rejected or retries are exhausted.
    pub async fn write(
        &self,
        stage: RunStage,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
        values: &BTreeMap<String, String>,
    ) -> Result<(), StepFault> {
        let mut retries = 0;
        loop {
            match self.groups.set_parameters(name, values).await {
                Ok(()) => return Ok(()),
                Err(err) if self.should_retry(&err, retries) => {
                    retries += 1;
                    self.note_retry(stage, instance_id, &err, retries);
                    self.wait(instance_id).await?;
                }
                Err(err) => return Err(StepFault::Remote(err)),
            }
        }
    }

    /// Deletes a parameter group, retrying through convergence on retryable faults.
    ///
    /// # Errors
    ///
    /// Returns [`StepFault`] when the delete is rejected or retries are exhausted.
    pub async fn delete(
        &self,
        stage: RunStage,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
    ) -> Result<(), StepFault> {
        let mut retries = 0;
        loop {
            match self.groups.delete_group(name).await {
                Ok(()) => return Ok(()),
                Err(err) if self.should_retry(&err, retries) => {
                    retries += 1;
                    self.note_retry(stage, instance_id, &err, retries);
                    self.wait(instance_id).await?;
                }
                Err(err) => return Err(StepFault::Remote(err)),
            }
        }
    }

    /// Returns true when a rejection may be retried.
    const fn should_retry(&self, err: &RemoteError, retries: u32) -> bool {
        matches!(err.kind, FaultKind::InvalidState | FaultKind::Transient) && retries < self.retries
    }

    /// Records an absorbed retryable rejection.
    fn note_retry(&self, stage: RunStage, instance_id: &InstanceId, err: &RemoteError, retry: u32) {
        self.audit.record(
            &RunEvent::new(instance_id, stage, EventOutcome::Absorbed)
                .with_detail(format!("{err}; waiting before retry {retry}"))
                .with_fault(err.kind),
        );
    }
}
