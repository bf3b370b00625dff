// crates/slowbro-core/src/runtime/revert.rs
// ============================================================================
// Module: Slowbro Compensation
// Description: Progress ledger and undo logic for a diagnostic run.
// Purpose: Return the instance to its pre-run configuration on every path.
// Dependencies: crate::{core, interfaces, runtime}, serde
// ============================================================================

//! ## Overview
//! [`Compensation`] records each remote mutation as the run issues it and
//! undoes exactly those mutations on revert. A mutation is recorded once it
//! succeeds, and also when its outcome is unknown (a transient or
//! unclassified fault), so a call that may have landed is still compensated.
//!
//! # Invariants
//! - Revert runs its actions at most once; later calls return an empty report.
//! - A dedicated group is deleted only after the original group is reattached.
//! - Delete failures are absorbed as warnings; reattach and restore failures
//!   are reported as the revert failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::core::InstanceId;
use crate::core::InstanceSnapshot;
use crate::core::ParameterGroupName;
use crate::core::SlowQuerySettings;
use crate::interfaces::InstanceStateReader;
use crate::interfaces::ParameterGroupManager;
use crate::runtime::audit::EventOutcome;
use crate::runtime::audit::RunEvent;
use crate::runtime::orchestrator::RunStage;
use crate::runtime::steps::GroupMutator;

// ============================================================================
// SECTION: Report
// ============================================================================

/// One completed revert action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RevertAction {
    /// The original parameter group was reattached and converged.
    ReattachedGroup {
        /// Reattached group.
        group: ParameterGroupName,
    },
    /// The dedicated parameter group was deleted.
    DeletedGroup {
        /// Deleted group.
        group: ParameterGroupName,
    },
    /// The original logging settings were written back and converged.
    RestoredParameters {
        /// Group the settings were written to.
        group: ParameterGroupName,
    },
}

impl fmt::Display for RevertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReattachedGroup {
                group,
            } => write!(f, "reattached {group}"),
            Self::DeletedGroup {
                group,
            } => write!(f, "deleted {group}"),
            Self::RestoredParameters {
                group,
            } => write!(f, "restored parameters on {group}"),
        }
    }
}

/// Outcome of a revert pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    /// Actions that completed.
    pub actions: Vec<RevertAction>,
    /// Absorbed best-effort failures.
    pub warnings: Vec<String>,
    /// Failure that left the instance in a modified state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RevertReport {
    /// Returns true when the instance was restored (or needed nothing).
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failure.is_none()
    }

    /// Returns true when no revert work was attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.warnings.is_empty() && self.failure.is_none()
    }
}

impl fmt::Display for RevertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(failure) = &self.failure {
            return write!(f, "revert failed: {failure}");
        }
        if self.actions.is_empty() {
            return f.write_str("nothing to revert");
        }
        let actions: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(f, "reverted: {}", actions.join(", "))
    }
}

// ============================================================================
// SECTION: Compensation
// ============================================================================

/// Mutation ledger for one run.
#[derive(Debug, Clone)]
pub struct Compensation {
    /// Target instance.
    instance_id: InstanceId,
    /// Group attached when the run started.
    original_group: ParameterGroupName,
    /// Settings written back when the original group was modified.
    restore: SlowQuerySettings,
    /// Dedicated group that may exist because of this run.
    dedicated: Option<ParameterGroupName>,
    /// Whether the dedicated group may be attached.
    dedicated_attached: bool,
    /// Whether the original group may hold written parameters.
    original_written: bool,
    /// Whether revert already ran.
    reverted: bool,
}

impl Compensation {
    /// Starts an empty ledger for the inspected instance.
    #[must_use]
    pub fn new(snapshot: &InstanceSnapshot, restore: SlowQuerySettings) -> Self {
        Self {
            instance_id: snapshot.instance_id.clone(),
            original_group: snapshot.parameter_group.clone(),
            restore,
            dedicated: None,
            dedicated_attached: false,
            original_written: false,
            reverted: false,
        }
    }

    /// Returns the dedicated group recorded for this run, if any.
    #[must_use]
    pub const fn dedicated_group(&self) -> Option<&ParameterGroupName> {
        self.dedicated.as_ref()
    }

    /// Records that a dedicated group may now exist.
    pub fn note_group_created(&mut self, name: ParameterGroupName) {
        self.dedicated = Some(name);
    }

    /// Records that the dedicated group may now be attached.
    pub const fn note_group_attach(&mut self) {
        if self.dedicated.is_some() {
            self.dedicated_attached = true;
        }
    }

    /// Records that `group` may now hold written parameters.
    pub fn note_parameter_write(&mut self, group: &ParameterGroupName) {
        if *group == self.original_group {
            self.original_written = true;
        }
    }

    /// Returns true when revert has work to do.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.reverted && (self.dedicated.is_some() || self.original_written)
    }

    /// Undoes the recorded mutations. A second call is a no-op.
    pub async fn revert<R, G>(&mut self, mutator: &GroupMutator<'_, R, G>) -> RevertReport
    where
        R: InstanceStateReader + ?Sized,
        G: ParameterGroupManager + ?Sized,
    {
        let mut report = RevertReport::default();
        if !self.is_pending() {
            return report;
        }
        self.reverted = true;
        self.emit(mutator, EventOutcome::Started, None);
        if let Some(dedicated) = self.dedicated.clone() {
            if self.dedicated_attached && !self.reattach(mutator, &mut report).await {
                self.emit(mutator, EventOutcome::Failed, Some(report.to_string()));
                return report;
            }
            self.delete(mutator, &dedicated, &mut report).await;
        } else if self.original_written {
            self.restore_settings(mutator, &mut report).await;
        }
        let outcome = if report.is_clean() { EventOutcome::Ok } else { EventOutcome::Failed };
        self.emit(mutator, outcome, Some(report.to_string()));
        report
    }

    /// Reattaches the original group and waits; returns false on failure.
    async fn reattach<R, G>(
        &self,
        mutator: &GroupMutator<'_, R, G>,
        report: &mut RevertReport,
    ) -> bool
    where
        R: InstanceStateReader + ?Sized,
        G: ParameterGroupManager + ?Sized,
    {
        let result = match mutator
            .attach(RunStage::Revert, &self.instance_id, &self.original_group)
            .await
        {
            Ok(()) => mutator.wait(&self.instance_id).await.map(|_| ()),
            Err(fault) => Err(fault),
        };
        match result {
            Ok(()) => {
                report.actions.push(RevertAction::ReattachedGroup {
                    group: self.original_group.clone(),
                });
                true
            }
            Err(fault) => {
                report.failure =
                    Some(format!("reattaching {} failed: {fault}", self.original_group));
                false
            }
        }
    }

    /// Deletes the dedicated group, retrying while it is still in use and
    /// absorbing the final failure.
    async fn delete<R, G>(
        &self,
        mutator: &GroupMutator<'_, R, G>,
        dedicated: &ParameterGroupName,
        report: &mut RevertReport,
    ) where
        R: InstanceStateReader + ?Sized,
        G: ParameterGroupManager + ?Sized,
    {
        match mutator.delete(RunStage::Revert, &self.instance_id, dedicated).await {
            Ok(()) => report.actions.push(RevertAction::DeletedGroup {
                group: dedicated.clone(),
            }),
            Err(fault) => {
                let mut event =
                    RunEvent::new(&self.instance_id, RunStage::Revert, EventOutcome::Absorbed)
                        .with_detail(format!("dedicated group left behind: {fault}"));
                if let Some(kind) = fault.kind() {
                    event = event.with_fault(kind);
                }
                mutator.audit().record(&event);
                report.warnings.push(format!("deleting {dedicated} failed: {fault}"));
            }
        }
    }

    /// Writes the original settings back onto the original group and waits.
    async fn restore_settings<R, G>(
        &self,
        mutator: &GroupMutator<'_, R, G>,
        report: &mut RevertReport,
    ) where
        R: InstanceStateReader + ?Sized,
        G: ParameterGroupManager + ?Sized,
    {
        let values = self.restore.to_parameters();
        let result = match mutator
            .write(RunStage::Revert, &self.instance_id, &self.original_group, &values)
            .await
        {
            Ok(()) => mutator.wait(&self.instance_id).await.map(|_| ()),
            Err(fault) => Err(fault),
        };
        match result {
            Ok(()) => report.actions.push(RevertAction::RestoredParameters {
                group: self.original_group.clone(),
            }),
            Err(fault) => {
                report.failure =
                    Some(format!("restoring settings on {} failed: {fault}", self.original_group));
            }
        }
    }

    /// Emits a revert stage event.
    fn emit<R, G>(
        &self,
        mutator: &GroupMutator<'_, R, G>,
        outcome: EventOutcome,
        detail: Option<String>,
    ) where
        R: InstanceStateReader + ?Sized,
        G: ParameterGroupManager + ?Sized,
    {
        let mut event = RunEvent::new(&self.instance_id, RunStage::Revert, outcome);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        mutator.audit().record(&event);
    }
}
