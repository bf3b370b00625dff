// crates/slowbro-server/tests/common/mod.rs
// ============================================================================
// Module: Common Server Test Fixtures
// Description: In-memory diagnosticians and a loopback server harness.
// Purpose: Drive the HTTP adapter end to end without a cloud account.
// Dependencies: slowbro-server, slowbro-core, tokio
// ============================================================================

//! ## Overview
//! The factory hands out orchestrators over one shared in-memory control
//! plane, so tests can inspect remote state after each request.

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

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use slowbro_core::ConvergencePolicy;
use slowbro_core::Diagnostician;
use slowbro_core::DigestError;
use slowbro_core::DigestProducer;
use slowbro_core::InMemoryControlPlane;
use slowbro_core::InstanceId;
use slowbro_core::OrchestratorConfig;
use slowbro_core::RemoteContext;
use slowbro_core::RequestAuditEvent;
use slowbro_core::RunAuditSink;
use slowbro_core::RunEvent;
use slowbro_core::SlowQueryOrchestrator;
use slowbro_server::DiagnosticianFactory;
use slowbro_server::ServerSettings;
use slowbro_server::SlowbroServer;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Sample slow-query log with two entries.
pub const SAMPLE_LOG: &str = "\
# Time: 2026-01-01T00:00:00.000000Z
# Query_time: 0.000123  Lock_time: 0.000010 Rows_sent: 1  Rows_examined: 1
SELECT 1;
# Query_time: 1.500000  Lock_time: 0.000010 Rows_sent: 10  Rows_examined: 100000
SELECT * FROM orders WHERE status = 'open';
";

/// Digest producer that counts queries in the log.
pub struct LineCountDigest;

#[async_trait]
impl DigestProducer for LineCountDigest {
    async fn digest(&self, instance_id: &InstanceId, log: &[u8]) -> Result<String, DigestError> {
        let text = std::str::from_utf8(log).map_err(|err| DigestError::Failed(err.to_string()))?;
        let queries = text.lines().filter(|line| line.starts_with("# Query_time")).count();
        Ok(format!("# digest for {instance_id}\n# {queries} queries\n"))
    }
}

/// Factory over a shared in-memory control plane.
pub struct MemoryFactory {
    /// Shared control plane.
    pub plane: Arc<InMemoryControlPlane>,
    /// Contexts requested so far.
    pub contexts: Mutex<Vec<RemoteContext>>,
}

#[async_trait]
impl DiagnosticianFactory for MemoryFactory {
    async fn diagnostician(&self, context: &RemoteContext) -> Arc<dyn Diagnostician> {
        self.contexts.lock().unwrap().push(context.clone());
        let config = OrchestratorConfig {
            convergence: ConvergencePolicy {
                settle_delay: Duration::ZERO,
                poll_interval: Duration::from_millis(5),
                max_attempts: 50,
            },
            ..OrchestratorConfig::default()
        };
        Arc::new(SlowQueryOrchestrator::new(
            Arc::clone(&self.plane),
            Arc::clone(&self.plane),
            Arc::clone(&self.plane),
            LineCountDigest,
            config,
        ))
    }
}

/// Audit sink that keeps request events in memory.
#[derive(Default)]
pub struct RequestRecorder {
    /// Recorded request events.
    pub requests: Mutex<Vec<RequestAuditEvent>>,
}

impl RequestRecorder {
    /// Returns a copy of the recorded request events.
    pub fn requests(&self) -> Vec<RequestAuditEvent> {
        self.requests.lock().unwrap().clone()
    }
}

impl RunAuditSink for RequestRecorder {
    fn record(&self, _event: &RunEvent) {}

    fn record_request(&self, event: &RequestAuditEvent) {
        self.requests.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Loopback server with its collaborators.
pub struct TestServer {
    /// Base URL of the server.
    pub base_url: String,
    /// Shared control plane.
    pub plane: Arc<InMemoryControlPlane>,
    /// Factory handed to the server.
    pub factory: Arc<MemoryFactory>,
    /// Request audit recorder.
    pub audit: Arc<RequestRecorder>,
}

impl TestServer {
    /// URL of the diagnose endpoint.
    pub fn url(&self) -> String {
        format!("{}/diagnose", self.base_url)
    }
}

/// Control plane with `db1` on a default group and `db2` on its own group.
pub fn seeded_plane() -> Arc<InMemoryControlPlane> {
    let plane = Arc::new(InMemoryControlPlane::new());
    plane.add_default_group("default.mysql5.7", "mysql5.7");
    plane.add_group("custom-prod", "mysql5.7");
    plane.add_instance("db1", "mysql", "5.7.34", "default.mysql5.7");
    plane.add_instance("db2", "mysql", "5.7.34", "custom-prod");
    plane.set_log("db1", SAMPLE_LOG);
    plane.set_log("db2", SAMPLE_LOG);
    plane
}

/// Starts a server on an ephemeral loopback port.
pub async fn spawn_server(plane: Arc<InMemoryControlPlane>, max_body_bytes: usize) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let factory = Arc::new(MemoryFactory {
        plane: Arc::clone(&plane),
        contexts: Mutex::new(Vec::new()),
    });
    let audit = Arc::new(RequestRecorder::default());
    let settings = ServerSettings {
        bind: addr,
        allowed_origin: "http://localhost:3000".to_string(),
        max_body_bytes,
        max_sample_seconds: 900,
    };
    let server = SlowbroServer::new(
        settings,
        Arc::clone(&factory) as Arc<dyn DiagnosticianFactory>,
        Arc::clone(&audit) as Arc<dyn RunAuditSink>,
    )
    .unwrap();
    tokio::spawn(server.serve_listener(listener, std::future::pending()));
    TestServer {
        base_url: format!("http://{addr}"),
        plane,
        factory,
        audit,
    }
}

/// Request body for `instance` with a `seconds` sample window.
pub fn form(instance: &str, seconds: u64) -> Value {
    json!({
        "identifier": instance,
        "profile": "",
        "region": "us-east-1",
        "slowQueryToggle": "off",
        "logType": "FILE",
        "sampleTime": seconds,
        "longQueryTime": "2",
    })
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
