// crates/slowbro-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for orchestrator integration tests.
// Purpose: Build in-memory control planes, digest fakes, and recording sinks.
// Dependencies: slowbro-core
// ============================================================================

//! ## Overview
//! Fixtures assemble a [`SlowQueryOrchestrator`] over the in-memory control
//! plane with a deterministic digest producer and a recording audit sink.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use slowbro_core::ConvergencePolicy;
use slowbro_core::DiagnosticJob;
use slowbro_core::DigestError;
use slowbro_core::DigestProducer;
use slowbro_core::InMemoryControlPlane;
use slowbro_core::InstanceId;
use slowbro_core::LogOutput;
use slowbro_core::OrchestratorConfig;
use slowbro_core::RemoteContext;
use slowbro_core::RunAuditSink;
use slowbro_core::RunEvent;
use slowbro_core::SlowQueryOrchestrator;
use slowbro_core::SlowQuerySettings;

// ============================================================================
// SECTION: Digest Fakes
// ============================================================================

/// Digest producer that summarizes the log deterministically.
#[derive(Default)]
pub struct LineCountDigest {
    /// Number of digest invocations.
    pub calls: Mutex<usize>,
}

#[async_trait]
impl DigestProducer for LineCountDigest {
    async fn digest(&self, instance_id: &InstanceId, log: &[u8]) -> Result<String, DigestError> {
        *self.calls.lock().unwrap() += 1;
        let text = std::str::from_utf8(log).map_err(|err| DigestError::Failed(err.to_string()))?;
        let queries = text.lines().filter(|line| line.starts_with("# Query_time")).count();
        Ok(format!("# digest for {instance_id}\n# {queries} queries\n"))
    }
}

/// Digest producer that always fails.
pub struct FailingDigest;

#[async_trait]
impl DigestProducer for FailingDigest {
    async fn digest(&self, _instance_id: &InstanceId, _log: &[u8]) -> Result<String, DigestError> {
        Err(DigestError::Unavailable("tool missing".to_string()))
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    /// Recorded events.
    pub events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl RunAuditSink for RecordingSink {
    fn record(&self, event: &RunEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Sample slow-query log with two entries.
pub const SAMPLE_LOG: &str = "\
# Time: 2026-01-01T00:00:00.000000Z
# Query_time: 0.000123  Lock_time: 0.000010 Rows_sent: 1  Rows_examined: 1
SELECT 1;
# Time: 2026-01-01T00:00:01.000000Z
# Query_time: 1.500000  Lock_time: 0.000010 Rows_sent: 10  Rows_examined: 100000
SELECT * FROM orders WHERE status = 'open';
";

/// Orchestrator over shared in-memory collaborators.
pub type TestOrchestrator<D> = SlowQueryOrchestrator<
    Arc<InMemoryControlPlane>,
    Arc<InMemoryControlPlane>,
    Arc<InMemoryControlPlane>,
    Arc<D>,
>;

/// Convergence policy matching production defaults with a small poll cap.
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        convergence: ConvergencePolicy {
            settle_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            max_attempts: 20,
        },
        ..OrchestratorConfig::default()
    }
}

/// Control plane with `db1` on `default.mysql5.7` and `db2` on `custom-prod`.
pub fn seeded_plane() -> Arc<InMemoryControlPlane> {
    let plane = Arc::new(InMemoryControlPlane::with_convergence_polls(2));
    plane.add_default_group("default.mysql5.7", "mysql5.7");
    plane.add_group("custom-prod", "mysql5.7");
    plane.seed_parameter("custom-prod", "slow_query_log", "0");
    plane.seed_parameter("custom-prod", "long_query_time", "2");
    plane.seed_parameter("custom-prod", "log_output", "FILE");
    plane.add_instance("db1", "mysql", "5.7.34", "default.mysql5.7");
    plane.add_instance("db2", "mysql", "5.7.34", "custom-prod");
    plane.set_log("db1", SAMPLE_LOG);
    plane.set_log("db2", SAMPLE_LOG);
    plane
}

/// Builds an orchestrator over `plane` with a recording sink.
pub fn orchestrator<D: DigestProducer>(
    plane: &Arc<InMemoryControlPlane>,
    digest: Arc<D>,
    sink: &Arc<RecordingSink>,
) -> TestOrchestrator<D> {
    SlowQueryOrchestrator::new(
        Arc::clone(plane),
        Arc::clone(plane),
        Arc::clone(plane),
        digest,
        test_config(),
    )
    .with_audit(Arc::clone(sink) as Arc<dyn RunAuditSink>)
}

/// Builds a job for `instance` with the given sampling window.
pub fn job(instance: &str, seconds: u64, restore: SlowQuerySettings) -> DiagnosticJob {
    DiagnosticJob {
        instance_id: InstanceId::new(instance).unwrap(),
        context: RemoteContext::default(),
        sample_window: Duration::from_secs(seconds),
        restore,
    }
}

/// Pre-run settings of `custom-prod`.
pub fn prod_restore() -> SlowQuerySettings {
    SlowQuerySettings::new(false, "2", LogOutput::File).unwrap()
}
