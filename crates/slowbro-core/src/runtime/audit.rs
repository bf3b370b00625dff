// crates/slowbro-core/src/runtime/audit.rs
// ============================================================================
// Module: Slowbro Run Audit
// Description: Structured JSON-line events for diagnostic runs and requests.
// Purpose: Record every stage transition and absorbed fault without hard deps.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Events are plain serializable structs written as one JSON object per line.
//! Raw log bytes and digest text never appear in events; collection is
//! recorded by byte count and SHA-256 only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::FaultKind;
use crate::core::InstanceId;
use crate::runtime::orchestrator::RunStage;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label for a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Stage began.
    Started,
    /// Stage or action completed.
    Ok,
    /// A fault was tolerated and the run continued.
    Absorbed,
    /// Stage or action failed.
    Failed,
    /// Stage was not needed for this run.
    Skipped,
}

/// Diagnostic run audit event.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Target instance.
    pub instance_id: String,
    /// Orchestrator stage.
    pub stage: RunStage,
    /// Stage outcome.
    pub outcome: EventOutcome,
    /// Optional human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Fault classification when a remote fault was involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_kind: Option<FaultKind>,
}

impl RunEvent {
    /// Creates a new run event with a consistent timestamp.
    #[must_use]
    pub fn new(instance_id: &InstanceId, stage: RunStage, outcome: EventOutcome) -> Self {
        Self {
            event: "slowbro_run",
            timestamp_ms: now_ms(),
            instance_id: instance_id.to_string(),
            stage,
            outcome,
            detail: None,
            fault_kind: None,
        }
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attaches a fault classification.
    #[must_use]
    pub const fn with_fault(mut self, kind: FaultKind) -> Self {
        self.fault_kind = Some(kind);
        self
    }
}

/// Inbound request audit event emitted by transports.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Target instance when the request parsed.
    pub instance_id: Option<String>,
    /// Peer address when known.
    pub peer: Option<String>,
    /// Response status code.
    pub status: u16,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Elapsed handling time in milliseconds.
    pub elapsed_ms: u128,
    /// Normalized error label when the request failed.
    pub error_kind: Option<&'static str>,
}

/// Inputs required to construct a request audit event.
pub struct RequestAuditEventParams {
    /// Target instance when the request parsed.
    pub instance_id: Option<String>,
    /// Peer address when known.
    pub peer: Option<String>,
    /// Response status code.
    pub status: u16,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Elapsed handling time in milliseconds.
    pub elapsed_ms: u128,
    /// Normalized error label when the request failed.
    pub error_kind: Option<&'static str>,
}

impl RequestAuditEvent {
    /// Creates a new request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        Self {
            event: "slowbro_request",
            timestamp_ms: now_ms(),
            instance_id: params.instance_id,
            peer: params.peer,
            status: params.status,
            request_bytes: params.request_bytes,
            elapsed_ms: params.elapsed_ms,
            error_kind: params.error_kind,
        }
    }
}

/// Milliseconds since the Unix epoch, zero if the clock is before it.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for run and request events.
pub trait RunAuditSink: Send + Sync {
    /// Record a run event.
    fn record(&self, event: &RunEvent);

    /// Record a request event.
    fn record_request(&self, _event: &RequestAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrRunAuditSink;

impl RunAuditSink for StderrRunAuditSink {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_request(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileRunAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileRunAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one serialized line and flushes.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl RunAuditSink for FileRunAuditSink {
    fn record(&self, event: &RunEvent) {
        self.write_line(event);
    }

    fn record_request(&self, event: &RequestAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopRunAuditSink;

impl RunAuditSink for NoopRunAuditSink {
    fn record(&self, _event: &RunEvent) {}
}
