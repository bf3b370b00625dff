// crates/slowbro-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Slowbro Orchestrator
// Description: Parameter-group lifecycle state machine for one diagnostic run.
// Purpose: Enable slow-query logging, sample, collect a digest, and revert.
// Dependencies: crate::{core, interfaces, runtime}, async-trait, serde, sha2
// ============================================================================

//! ## Overview
//! [`SlowQueryOrchestrator`] drives the stages Inspect, Provision, `CycleOff`,
//! `EnableOn`, Sample, Collect, and Revert in strict sequence. Every mutation
//! is followed by a convergence wait before the next one is issued.
//!
//! # Invariants
//! - An instance on a default parameter group is moved onto a dedicated group
//!   before any parameter write; default groups are never written.
//! - Once Inspect succeeds, Revert runs exactly once on every exit path,
//!   including faults and cancellation.
//! - A failed Inspect performs no mutation and reverts nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::DiagnosticJob;
use crate::core::FaultKind;
use crate::core::InstanceId;
use crate::core::InstanceSnapshot;
use crate::core::ParameterGroupName;
use crate::core::RemoteError;
use crate::core::SlowQuerySettings;
use crate::interfaces::DigestError;
use crate::interfaces::DigestProducer;
use crate::interfaces::GroupCreated;
use crate::interfaces::InstanceStateReader;
use crate::interfaces::ParameterGroupManager;
use crate::interfaces::SlowLogSource;
use crate::runtime::audit::EventOutcome;
use crate::runtime::audit::NoopRunAuditSink;
use crate::runtime::audit::RunAuditSink;
use crate::runtime::audit::RunEvent;
use crate::runtime::cancel::CancelSignal;
use crate::runtime::revert::Compensation;
use crate::runtime::revert::RevertReport;
use crate::runtime::steps::GroupMutator;
use crate::runtime::waiter::ConvergencePolicy;
use crate::runtime::waiter::WaitError;

// ============================================================================
// SECTION: Stages
// ============================================================================

/// Orchestrator stage labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    /// Fetch the instance snapshot.
    Inspect,
    /// Create and attach a dedicated group when on a default group.
    Provision,
    /// Write logging off to force the log file to rotate.
    CycleOff,
    /// Write logging on with a zero threshold.
    EnableOn,
    /// Let queries accumulate.
    Sample,
    /// Download the log and produce the digest.
    Collect,
    /// Undo the run's mutations.
    Revert,
    /// Run finished.
    Done,
}

impl RunStage {
    /// Returns the stable label for this stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inspect => "inspect",
            Self::Provision => "provision",
            Self::CycleOff => "cycle_off",
            Self::EnableOn => "enable_on",
            Self::Sample => "sample",
            Self::Collect => "collect",
            Self::Revert => "revert",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fault that ended a stage.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFault {
    /// A remote call failed.
    #[error(transparent)]
    Remote(RemoteError),
    /// A convergence wait failed.
    #[error(transparent)]
    Wait(WaitError),
    /// The digest could not be produced.
    #[error(transparent)]
    Digest(DigestError),
    /// The caller cancelled the run.
    #[error("run cancelled")]
    Cancelled,
}

impl StepFault {
    /// Returns the remote fault classification, when one applies.
    #[must_use]
    pub const fn kind(&self) -> Option<FaultKind> {
        match self {
            Self::Remote(err) => Some(err.kind),
            Self::Wait(err) => Some(err.kind()),
            Self::Digest(_) | Self::Cancelled => None,
        }
    }

    /// Returns true when the failed call may still have taken effect.
    #[must_use]
    pub const fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Remote(err) if matches!(err.kind, FaultKind::Transient | FaultKind::Other))
    }

    /// Returns a stable label for this fault.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Remote(err) => err.kind.as_str(),
            Self::Wait(WaitError::Stuck {
                ..
            }) => "stuck",
            Self::Wait(WaitError::Remote(err)) => err.kind.as_str(),
            Self::Digest(_) => "digest",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<RemoteError> for StepFault {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}

impl From<DigestError> for StepFault {
    fn from(err: DigestError) -> Self {
        Self::Digest(err)
    }
}

/// Orchestrator run errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The job was rejected before any remote call.
    #[error("invalid diagnostic job: {0}")]
    InvalidJob(String),
    /// A stage failed; the digest was not produced.
    #[error("diagnostic aborted during {stage}: {fault} ({revert})")]
    Aborted {
        /// Stage that failed.
        stage: RunStage,
        /// Fault that ended the stage.
        fault: StepFault,
        /// Revert outcome.
        revert: RevertReport,
    },
    /// The digest was produced but the instance could not be restored.
    #[error("diagnostic produced but {revert}")]
    RevertIncomplete {
        /// Digest text.
        digest: String,
        /// Revert outcome.
        revert: RevertReport,
    },
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Parameter groups treated as unmodifiable service defaults.
pub const DEFAULT_PARAMETER_GROUPS: &[&str] =
    &["default.mysql5.6", "default.mysql5.7", "default.mysql8.0"];
/// Default dedicated group name prefix.
pub const DEFAULT_DEDICATED_GROUP_PREFIX: &str = "slowbro";
/// Default number of re-issues for a rejected mutation.
pub const DEFAULT_MUTATION_RETRIES: u32 = 3;

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Convergence polling policy.
    pub convergence: ConvergencePolicy,
    /// Re-issues allowed for an `InvalidState` or `Transient` rejection.
    pub mutation_retries: u32,
    /// Group names (exact match) that must never be written.
    pub default_parameter_groups: BTreeSet<String>,
    /// Prefix for dedicated group names.
    pub dedicated_group_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            convergence: ConvergencePolicy::default(),
            mutation_retries: DEFAULT_MUTATION_RETRIES,
            default_parameter_groups: DEFAULT_PARAMETER_GROUPS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            dedicated_group_prefix: DEFAULT_DEDICATED_GROUP_PREFIX.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Returns true when `group` is a service default group.
    #[must_use]
    pub fn is_default_group(&self, group: &ParameterGroupName) -> bool {
        self.default_parameter_groups.contains(group.as_str())
    }
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Successful run artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    /// Target instance.
    pub instance_id: InstanceId,
    /// Digest text.
    pub digest: String,
    /// Dedicated group used for the run, if one was provisioned.
    pub dedicated_group: Option<ParameterGroupName>,
    /// Raw log size in bytes.
    pub log_bytes: usize,
    /// Lowercase hex SHA-256 of the raw log.
    pub log_sha256: String,
    /// Revert outcome.
    pub revert: RevertReport,
}

/// Output of the Collect stage.
struct Collected {
    /// Digest text.
    digest: String,
    /// Raw log size in bytes.
    log_bytes: usize,
    /// Lowercase hex SHA-256 of the raw log.
    log_sha256: String,
}

/// Stage paired with the fault that ended it.
struct StageFailure {
    /// Failed stage.
    stage: RunStage,
    /// Fault.
    fault: StepFault,
}

impl StageFailure {
    /// Builds a stage failure.
    const fn new(stage: RunStage, fault: StepFault) -> Self {
        Self {
            stage,
            fault,
        }
    }
}

// ============================================================================
// SECTION: Diagnostician
// ============================================================================

/// Runs a diagnostic job to completion.
#[async_trait]
pub trait Diagnostician: Send + Sync {
    /// Runs the job, honoring `cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the digest could not be produced or
    /// the instance could not be restored.
    async fn diagnose(
        &self,
        job: &DiagnosticJob,
        cancel: &CancelSignal,
    ) -> Result<DiagnosticReport, OrchestratorError>;
}

#[async_trait]
impl<T: Diagnostician + ?Sized> Diagnostician for Arc<T> {
    async fn diagnose(
        &self,
        job: &DiagnosticJob,
        cancel: &CancelSignal,
    ) -> Result<DiagnosticReport, OrchestratorError> {
        (**self).diagnose(job, cancel).await
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Slow-query logging lifecycle orchestrator.
pub struct SlowQueryOrchestrator<R, G, L, D> {
    /// Instance state source.
    reader: R,
    /// Parameter group manager.
    groups: G,
    /// Log source.
    logs: L,
    /// Digest producer.
    digest: D,
    /// Tuning.
    config: OrchestratorConfig,
    /// Audit sink.
    audit: Arc<dyn RunAuditSink>,
}

impl<R, G, L, D> SlowQueryOrchestrator<R, G, L, D>
where
    R: InstanceStateReader,
    G: ParameterGroupManager,
    L: SlowLogSource,
    D: DigestProducer,
{
    /// Creates an orchestrator with a no-op audit sink.
    #[must_use]
    pub fn new(reader: R, groups: G, logs: L, digest: D, config: OrchestratorConfig) -> Self {
        Self {
            reader,
            groups,
            logs,
            digest,
            config,
            audit: Arc::new(NoopRunAuditSink),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn RunAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the orchestrator configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one diagnostic job.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Aborted`] when a stage fails (after
    /// reverting), or [`OrchestratorError::RevertIncomplete`] when the digest
    /// was produced but the instance could not be restored.
    pub async fn run(
        &self,
        job: &DiagnosticJob,
        cancel: &CancelSignal,
    ) -> Result<DiagnosticReport, OrchestratorError> {
        if job.sample_window.is_zero() {
            return Err(OrchestratorError::InvalidJob(
                "sample window must be greater than zero".to_string(),
            ));
        }
        let instance_id = &job.instance_id;
        let snapshot = self.inspect(instance_id, cancel).await.map_err(|fault| {
            OrchestratorError::Aborted {
                stage: RunStage::Inspect,
                fault,
                revert: RevertReport::default(),
            }
        })?;

        let mut compensation = Compensation::new(&snapshot, job.restore.clone());
        let mutator = self.mutator();
        let outcome = self.run_stages(job, &snapshot, &mut compensation, &mutator, cancel).await;
        let revert = compensation.revert(&mutator).await;
        let dedicated_group = compensation.dedicated_group().cloned();

        match outcome {
            Ok(collected) if revert.is_clean() => {
                self.emit(
                    RunEvent::new(instance_id, RunStage::Done, EventOutcome::Ok)
                        .with_detail(format!("digest {} bytes", collected.digest.len())),
                );
                Ok(DiagnosticReport {
                    instance_id: instance_id.clone(),
                    digest: collected.digest,
                    dedicated_group,
                    log_bytes: collected.log_bytes,
                    log_sha256: collected.log_sha256,
                    revert,
                })
            }
            Ok(collected) => {
                self.emit(
                    RunEvent::new(instance_id, RunStage::Done, EventOutcome::Failed)
                        .with_detail(revert.to_string()),
                );
                Err(OrchestratorError::RevertIncomplete {
                    digest: collected.digest,
                    revert,
                })
            }
            Err(failure) => {
                let mut event = RunEvent::new(instance_id, RunStage::Done, EventOutcome::Failed)
                    .with_detail(format!("aborted during {}: {}", failure.stage, failure.fault));
                if let Some(kind) = failure.fault.kind() {
                    event = event.with_fault(kind);
                }
                self.emit(event);
                Err(OrchestratorError::Aborted {
                    stage: failure.stage,
                    fault: failure.fault,
                    revert,
                })
            }
        }
    }

    /// Builds the mutation helper over this orchestrator's collaborators.
    fn mutator(&self) -> GroupMutator<'_, R, G> {
        GroupMutator::new(
            &self.reader,
            &self.groups,
            self.config.convergence,
            self.config.mutation_retries,
            self.audit.as_ref(),
        )
    }

    /// Records one run event.
    fn emit(&self, event: RunEvent) {
        self.audit.record(&event);
    }

    /// Records a stage failure event.
    fn emit_failure(&self, instance_id: &InstanceId, stage: RunStage, fault: &StepFault) {
        let mut event =
            RunEvent::new(instance_id, stage, EventOutcome::Failed).with_detail(fault.to_string());
        if let Some(kind) = fault.kind() {
            event = event.with_fault(kind);
        }
        self.emit(event);
    }

    /// Returns a cancellation failure when the caller cancelled.
    fn check_cancel(
        &self,
        instance_id: &InstanceId,
        stage: RunStage,
        cancel: &CancelSignal,
    ) -> Result<(), StageFailure> {
        if cancel.is_cancelled() {
            self.emit_failure(instance_id, stage, &StepFault::Cancelled);
            return Err(StageFailure::new(stage, StepFault::Cancelled));
        }
        Ok(())
    }

    /// Fetches the starting snapshot, retrying transient faults.
    async fn inspect(
        &self,
        instance_id: &InstanceId,
        cancel: &CancelSignal,
    ) -> Result<InstanceSnapshot, StepFault> {
        self.emit(RunEvent::new(instance_id, RunStage::Inspect, EventOutcome::Started));
        if cancel.is_cancelled() {
            self.emit_failure(instance_id, RunStage::Inspect, &StepFault::Cancelled);
            return Err(StepFault::Cancelled);
        }
        let mut retries = 0;
        let snapshot = loop {
            match self.reader.fetch(instance_id).await {
                Ok(snapshot) => break snapshot,
                Err(err)
                    if err.kind == FaultKind::Transient
                        && retries < self.config.mutation_retries =>
                {
                    retries += 1;
                    self.emit(
                        RunEvent::new(instance_id, RunStage::Inspect, EventOutcome::Absorbed)
                            .with_detail(format!("{err}; retry {retries}"))
                            .with_fault(err.kind),
                    );
                    tokio::time::sleep(self.config.convergence.poll_interval).await;
                }
                Err(err) => {
                    let fault = StepFault::Remote(err);
                    self.emit_failure(instance_id, RunStage::Inspect, &fault);
                    return Err(fault);
                }
            }
        };
        self.emit(
            RunEvent::new(instance_id, RunStage::Inspect, EventOutcome::Ok).with_detail(format!(
                "group {} family {} status {}",
                snapshot.parameter_group, snapshot.family, snapshot.status
            )),
        );
        Ok(snapshot)
    }

    /// Runs Provision through Collect.
    async fn run_stages(
        &self,
        job: &DiagnosticJob,
        snapshot: &InstanceSnapshot,
        compensation: &mut Compensation,
        mutator: &GroupMutator<'_, R, G>,
        cancel: &CancelSignal,
    ) -> Result<Collected, StageFailure> {
        let instance_id = &job.instance_id;

        let target = if self.config.is_default_group(&snapshot.parameter_group) {
            self.check_cancel(instance_id, RunStage::Provision, cancel)?;
            self.provision(snapshot, compensation, mutator)
                .await
                .map_err(|fault| self.fail(instance_id, RunStage::Provision, fault))?
        } else {
            self.emit(
                RunEvent::new(instance_id, RunStage::Provision, EventOutcome::Skipped)
                    .with_detail(format!("{} is not a default group", snapshot.parameter_group)),
            );
            snapshot.parameter_group.clone()
        };

        self.check_cancel(instance_id, RunStage::CycleOff, cancel)?;
        self.write_settings(
            RunStage::CycleOff,
            instance_id,
            &target,
            &job.restore.disabled(),
            compensation,
            mutator,
        )
        .await
        .map_err(|fault| self.fail(instance_id, RunStage::CycleOff, fault))?;

        self.check_cancel(instance_id, RunStage::EnableOn, cancel)?;
        self.write_settings(
            RunStage::EnableOn,
            instance_id,
            &target,
            &SlowQuerySettings::capture_all(),
            compensation,
            mutator,
        )
        .await
        .map_err(|fault| self.fail(instance_id, RunStage::EnableOn, fault))?;

        self.check_cancel(instance_id, RunStage::Sample, cancel)?;
        self.sample(instance_id, job.sample_window, cancel)
            .await
            .map_err(|fault| self.fail(instance_id, RunStage::Sample, fault))?;

        self.check_cancel(instance_id, RunStage::Collect, cancel)?;
        self.collect(instance_id)
            .await
            .map_err(|fault| self.fail(instance_id, RunStage::Collect, fault))
    }

    /// Records a stage failure and pairs it with the stage.
    fn fail(&self, instance_id: &InstanceId, stage: RunStage, fault: StepFault) -> StageFailure {
        self.emit_failure(instance_id, stage, &fault);
        StageFailure::new(stage, fault)
    }

    /// Creates and attaches the dedicated group; returns its name.
    async fn provision(
        &self,
        snapshot: &InstanceSnapshot,
        compensation: &mut Compensation,
        mutator: &GroupMutator<'_, R, G>,
    ) -> Result<ParameterGroupName, StepFault> {
        let instance_id = &snapshot.instance_id;
        let name = ParameterGroupName::dedicated(
            &self.config.dedicated_group_prefix,
            instance_id,
            &snapshot.family,
        );
        self.emit(
            RunEvent::new(instance_id, RunStage::Provision, EventOutcome::Started)
                .with_detail(format!("creating {name} for family {}", snapshot.family)),
        );
        match self.groups.create_group(&name, &snapshot.family).await {
            Ok(GroupCreated::Created) => compensation.note_group_created(name.clone()),
            Ok(GroupCreated::AlreadyExists) => {
                compensation.note_group_created(name.clone());
                self.note_existing_group(instance_id, &name, None);
            }
            Err(err) if err.kind == FaultKind::AlreadyExists => {
                compensation.note_group_created(name.clone());
                self.note_existing_group(instance_id, &name, Some(&err));
            }
            Err(err) => {
                let fault = StepFault::Remote(err);
                if fault.is_indeterminate() {
                    compensation.note_group_created(name.clone());
                }
                return Err(fault);
            }
        }

        let attached = mutator.attach(RunStage::Provision, instance_id, &name).await;
        if attached.as_ref().err().is_none_or(StepFault::is_indeterminate) {
            compensation.note_group_attach();
        }
        attached?;
        let converged = mutator.wait(instance_id).await?;
        self.emit(
            RunEvent::new(instance_id, RunStage::Provision, EventOutcome::Ok).with_detail(format!(
                "attached {name}; instance reports {}",
                converged.parameter_group
            )),
        );
        Ok(name)
    }

    /// Records an absorbed `AlreadyExists` on group creation.
    fn note_existing_group(
        &self,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
        err: Option<&RemoteError>,
    ) {
        let detail = err.map_or_else(
            || format!("{name} already exists; reusing"),
            |err| format!("{err}; reusing {name}"),
        );
        self.emit(
            RunEvent::new(instance_id, RunStage::Provision, EventOutcome::Absorbed)
                .with_detail(detail)
                .with_fault(FaultKind::AlreadyExists),
        );
    }

    /// Writes one settings set to `target` and waits for it to converge.
    async fn write_settings(
        &self,
        stage: RunStage,
        instance_id: &InstanceId,
        target: &ParameterGroupName,
        settings: &SlowQuerySettings,
        compensation: &mut Compensation,
        mutator: &GroupMutator<'_, R, G>,
    ) -> Result<(), StepFault> {
        let values = settings.to_parameters();
        self.emit(
            RunEvent::new(instance_id, stage, EventOutcome::Started).with_detail(format!(
                "{target}: slow_query_log={} long_query_time={} log_output={}",
                u8::from(settings.enabled),
                settings.long_query_time,
                settings.log_output
            )),
        );
        let written = mutator.write(stage, instance_id, target, &values).await;
        if written.as_ref().err().is_none_or(StepFault::is_indeterminate) {
            compensation.note_parameter_write(target);
        }
        written?;
        mutator.wait(instance_id).await?;
        self.emit(RunEvent::new(instance_id, stage, EventOutcome::Ok));
        Ok(())
    }

    /// Sleeps for the sampling window unless cancelled.
    async fn sample(
        &self,
        instance_id: &InstanceId,
        window: Duration,
        cancel: &CancelSignal,
    ) -> Result<(), StepFault> {
        self.emit(
            RunEvent::new(instance_id, RunStage::Sample, EventOutcome::Started)
                .with_detail(format!("sampling for {}s", window.as_secs())),
        );
        tokio::select! {
            () = tokio::time::sleep(window) => {}
            () = cancel.cancelled() => return Err(StepFault::Cancelled),
        }
        self.emit(RunEvent::new(instance_id, RunStage::Sample, EventOutcome::Ok));
        Ok(())
    }

    /// Downloads the log and produces the digest.
    async fn collect(&self, instance_id: &InstanceId) -> Result<Collected, StepFault> {
        self.emit(RunEvent::new(instance_id, RunStage::Collect, EventOutcome::Started));
        let log = self.logs.fetch_slow_log(instance_id).await?;
        let log_sha256 = sha256_hex(&log);
        self.emit(
            RunEvent::new(instance_id, RunStage::Collect, EventOutcome::Ok)
                .with_detail(format!("downloaded {} bytes sha256 {log_sha256}", log.len())),
        );
        let digest = self.digest.digest(instance_id, &log).await?;
        Ok(Collected {
            digest,
            log_bytes: log.len(),
            log_sha256,
        })
    }
}

#[async_trait]
impl<R, G, L, D> Diagnostician for SlowQueryOrchestrator<R, G, L, D>
where
    R: InstanceStateReader,
    G: ParameterGroupManager,
    L: SlowLogSource,
    D: DigestProducer,
{
    async fn diagnose(
        &self,
        job: &DiagnosticJob,
        cancel: &CancelSignal,
    ) -> Result<DiagnosticReport, OrchestratorError> {
        self.run(job, cancel).await
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
