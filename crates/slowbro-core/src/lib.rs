// crates/slowbro-core/src/lib.rs
// ============================================================================
// Module: Slowbro Core
// Description: Slow-query diagnostic orchestration for managed MySQL instances.
// Purpose: Enable slow-query logging, sample, digest, and restore the instance.
// Dependencies: async-trait, serde, sha2, thiserror, tokio
// ============================================================================

//! ## Overview
//! Slowbro Core holds the parameter-group lifecycle orchestrator and the
//! boundaries it drives. It performs no network or process I/O itself:
//! adapters implement [`interfaces`] for a concrete control plane and
//! analysis tool, and transports hand a [`DiagnosticJob`] to
//! [`SlowQueryOrchestrator::run`].
//!
//! Every run that gets past inspection routes through a compensating revert,
//! so an instance is never left on a temporary parameter group or with
//! logging enabled by this crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::DigestError;
pub use interfaces::DigestProducer;
pub use interfaces::GroupCreated;
pub use interfaces::InstanceStateReader;
pub use interfaces::ParameterGroupManager;
pub use interfaces::SlowLogSource;
pub use runtime::ApplyWaiter;
pub use runtime::CancelHandle;
pub use runtime::CancelSignal;
pub use runtime::Compensation;
pub use runtime::ConvergencePolicy;
pub use runtime::DEFAULT_DEDICATED_GROUP_PREFIX;
pub use runtime::DEFAULT_MUTATION_RETRIES;
pub use runtime::DEFAULT_PARAMETER_GROUPS;
pub use runtime::DiagnosticReport;
pub use runtime::Diagnostician;
pub use runtime::EventOutcome;
pub use runtime::FileRunAuditSink;
pub use runtime::InMemoryControlPlane;
pub use runtime::NoopRunAuditSink;
pub use runtime::OrchestratorConfig;
pub use runtime::OrchestratorError;
pub use runtime::RemoteCall;
pub use runtime::RequestAuditEvent;
pub use runtime::RequestAuditEventParams;
pub use runtime::RevertAction;
pub use runtime::RevertReport;
pub use runtime::RunAuditSink;
pub use runtime::RunEvent;
pub use runtime::RunStage;
pub use runtime::SlowQueryOrchestrator;
pub use runtime::StderrRunAuditSink;
pub use runtime::StepFault;
pub use runtime::WaitError;
pub use runtime::cancel_pair;
