// crates/slowbro-server/src/server.rs
// ============================================================================
// Module: Slowbro HTTP Server
// Description: axum router, request handling, and run supervision.
// Purpose: Run one diagnostic per request and map outcomes to HTTP.
// Dependencies: slowbro-core, slowbro-config, axum, tokio
// ============================================================================

//! ## Overview
//! Each accepted request claims its instance, builds a diagnostician for the
//! request's remote context, and runs the job in a spawned task. If the
//! caller disconnects, the handler is dropped and its guard fires the run's
//! cancel signal, so the run short-circuits into revert instead of being
//! abandoned mid-mutation.
//!
//! # Invariants
//! - At most one run per instance is active; a second request gets `409`.
//! - An instance stays claimed until its run, including revert, finishes.
//! - Every response carries `Access-Control-Allow-Origin`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Instant;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::any;
use serde_json::Value;
use serde_json::json;
use slowbro_config::SlowbroConfig;
use slowbro_core::CancelHandle;
use slowbro_core::Diagnostician;
use slowbro_core::InstanceId;
use slowbro_core::OrchestratorError;
use slowbro_core::RemoteContext;
use slowbro_core::RequestAuditEvent;
use slowbro_core::RequestAuditEventParams;
use slowbro_core::RunAuditSink;
use slowbro_core::cancel_pair;
use tokio::net::TcpListener;

use crate::form::TuneForm;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Methods advertised to browsers.
const ALLOWED_METHODS: &str = "POST, OPTIONS";
/// Request headers advertised to browsers.
const ALLOWED_HEADERS: &str = "content-type";

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Builds the diagnostician that serves one request.
///
/// Remote clients depend on the request's profile and region, so one is
/// built per request.
#[async_trait]
pub trait DiagnosticianFactory: Send + Sync {
    /// Returns a diagnostician bound to `context`.
    async fn diagnostician(&self, context: &RemoteContext) -> Arc<dyn Diagnostician>;
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// HTTP adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Socket address to bind.
    pub bind: SocketAddr,
    /// Value of the `Access-Control-Allow-Origin` response header.
    pub allowed_origin: String,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Largest accepted sample window in seconds.
    pub max_sample_seconds: u64,
}

impl ServerSettings {
    /// Derives server settings from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the bind address does not parse.
    pub fn from_config(config: &SlowbroConfig) -> Result<Self, ServerError> {
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        Ok(Self {
            bind,
            allowed_origin: config.server.allowed_origin.trim().to_string(),
            max_body_bytes: config.server.max_body_bytes,
            max_sample_seconds: config.orchestrator.max_sample_seconds,
        })
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server for diagnostic requests.
pub struct SlowbroServer {
    /// Adapter settings.
    settings: ServerSettings,
    /// State shared with handlers.
    state: Arc<ServerState>,
}

impl SlowbroServer {
    /// Creates a server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the allowed origin is not a valid
    /// header value.
    pub fn new(
        settings: ServerSettings,
        factory: Arc<dyn DiagnosticianFactory>,
        audit: Arc<dyn RunAuditSink>,
    ) -> Result<Self, ServerError> {
        let allowed_origin = HeaderValue::from_str(&settings.allowed_origin)
            .map_err(|_| ServerError::Config("invalid allowed origin".to_string()))?;
        let state = Arc::new(ServerState {
            factory,
            audit,
            allowed_origin,
            max_body_bytes: settings.max_body_bytes,
            max_sample_seconds: settings.max_sample_seconds,
            active: Arc::new(Mutex::new(HashSet::new())),
        });
        Ok(Self {
            settings,
            state,
        })
    }

    /// Returns the adapter settings.
    #[must_use]
    pub const fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Builds the request router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", any(handle_diagnose))
            .route("/diagnose", any(handle_diagnose))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = bind(self.settings.bind).await?;
        self.serve_listener(listener, std::future::pending()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// In-flight runs are allowed to finish, including their revert.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when serving fails.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Binds a TCP listener.
///
/// # Errors
///
/// Returns [`ServerError::Transport`] when the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|err| ServerError::Transport(format!("http bind on {addr} failed: {err}")))
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Shared server state for handlers.
struct ServerState {
    /// Diagnostician factory.
    factory: Arc<dyn DiagnosticianFactory>,
    /// Request audit sink.
    audit: Arc<dyn RunAuditSink>,
    /// CORS origin header value.
    allowed_origin: HeaderValue,
    /// Maximum request body size.
    max_body_bytes: usize,
    /// Largest accepted sample window.
    max_sample_seconds: u64,
    /// Instances with a run in flight.
    active: Arc<Mutex<HashSet<InstanceId>>>,
}

/// Handles one diagnostic request and records its audit event.
async fn handle_diagnose(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let started = Instant::now();
    let outcome = dispatch(&state, request).await;
    state.audit.record_request(&RequestAuditEvent::new(RequestAuditEventParams {
        instance_id: outcome.instance_id.as_ref().map(ToString::to_string),
        peer: Some(peer.to_string()),
        status: outcome.status.as_u16(),
        request_bytes: outcome.request_bytes,
        elapsed_ms: started.elapsed().as_millis(),
        error_kind: outcome.error_kind,
    }));
    outcome.into_response(&state.allowed_origin)
}

/// Validates the request and supervises its run.
async fn dispatch(state: &ServerState, request: Request) -> Outcome {
    let method = request.method().clone();
    if method == Method::OPTIONS {
        return Outcome::preflight();
    }
    if method != Method::POST {
        return Outcome::error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "only POST is accepted".to_string(),
        );
    }
    let Ok(bytes) = axum::body::to_bytes(request.into_body(), state.max_body_bytes).await else {
        return Outcome::error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "body_too_large",
            format!("request body exceeds {} bytes", state.max_body_bytes),
        );
    };
    let request_bytes = bytes.len();
    let job = match serde_json::from_slice::<TuneForm>(&bytes) {
        Ok(form) => form.into_job(state.max_sample_seconds).map_err(|err| err.to_string()),
        Err(err) => Err(format!("invalid request body: {err}")),
    };
    let job = match job {
        Ok(job) => job,
        Err(message) => {
            return Outcome::error(StatusCode::BAD_REQUEST, "invalid_request", message)
                .with_bytes(request_bytes);
        }
    };
    let instance_id = job.instance_id.clone();
    let Some(claim) = ActiveClaim::acquire(&state.active, &instance_id) else {
        return Outcome::error(
            StatusCode::CONFLICT,
            "conflict",
            format!("a diagnostic run is already active for {instance_id}"),
        )
        .with_bytes(request_bytes)
        .with_instance(instance_id);
    };

    let diagnostician = state.factory.diagnostician(&job.context).await;
    let (handle, signal) = cancel_pair();
    let mut guard = CancelOnDrop::new(handle);
    let task = tokio::spawn(async move {
        let _claim = claim;
        diagnostician.diagnose(&job, &signal).await
    });
    let joined = task.await;
    guard.disarm();

    let outcome = match joined {
        Ok(Ok(report)) => Outcome::digest(report.digest),
        Ok(Err(err)) => Outcome::from_orchestrator(&err),
        Err(err) => Outcome::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("diagnostic task failed: {err}"),
        ),
    };
    outcome.with_bytes(request_bytes).with_instance(instance_id)
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Response body variants.
#[derive(Debug)]
enum OutcomeBody {
    /// Plain-text digest.
    Digest(String),
    /// JSON error document.
    Json(Value),
    /// CORS preflight answer.
    Preflight,
}

/// Handler result plus the fields recorded in the request audit.
#[derive(Debug)]
pub(crate) struct Outcome {
    /// Response status.
    status: StatusCode,
    /// Response body.
    body: OutcomeBody,
    /// Target instance when the request parsed.
    instance_id: Option<InstanceId>,
    /// Request body size.
    request_bytes: usize,
    /// Audit error label.
    error_kind: Option<&'static str>,
}

impl Outcome {
    /// Successful digest response.
    const fn digest(digest: String) -> Self {
        Self {
            status: StatusCode::OK,
            body: OutcomeBody::Digest(digest),
            instance_id: None,
            request_bytes: 0,
            error_kind: None,
        }
    }

    /// Preflight response.
    const fn preflight() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: OutcomeBody::Preflight,
            instance_id: None,
            request_bytes: 0,
            error_kind: None,
        }
    }

    /// JSON error response.
    fn error(status: StatusCode, kind: &'static str, message: String) -> Self {
        Self {
            status,
            body: OutcomeBody::Json(json!({ "error": message })),
            instance_id: None,
            request_bytes: 0,
            error_kind: Some(kind),
        }
    }

    /// Maps an orchestrator failure to a response.
    pub(crate) fn from_orchestrator(err: &OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidJob(message) => {
                Self::error(StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }
            OrchestratorError::Aborted {
                stage,
                fault,
                revert,
            } => Self {
                status: StatusCode::BAD_GATEWAY,
                body: OutcomeBody::Json(json!({
                    "error": err.to_string(),
                    "stage": stage,
                    "fault": fault.label(),
                    "revert": revert,
                })),
                instance_id: None,
                request_bytes: 0,
                error_kind: Some("aborted"),
            },
            OrchestratorError::RevertIncomplete {
                digest,
                revert,
            } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: OutcomeBody::Json(json!({
                    "error": err.to_string(),
                    "digest": digest,
                    "revert": revert,
                })),
                instance_id: None,
                request_bytes: 0,
                error_kind: Some("revert_incomplete"),
            },
        }
    }

    /// Records the request body size.
    const fn with_bytes(mut self, request_bytes: usize) -> Self {
        self.request_bytes = request_bytes;
        self
    }

    /// Records the target instance.
    fn with_instance(mut self, instance_id: InstanceId) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    /// Returns the response status.
    #[cfg(test)]
    pub(crate) const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the audit error label.
    #[cfg(test)]
    pub(crate) const fn error_kind(&self) -> Option<&'static str> {
        self.error_kind
    }

    /// Returns the JSON body, if any.
    #[cfg(test)]
    pub(crate) const fn json(&self) -> Option<&Value> {
        match &self.body {
            OutcomeBody::Json(value) => Some(value),
            OutcomeBody::Digest(_) | OutcomeBody::Preflight => None,
        }
    }

    /// Renders the HTTP response.
    fn into_response(self, allowed_origin: &HeaderValue) -> Response {
        let mut response = match self.body {
            OutcomeBody::Digest(digest) => {
                (self.status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], digest)
                    .into_response()
            }
            OutcomeBody::Json(value) => (self.status, Json(value)).into_response(),
            OutcomeBody::Preflight => (
                self.status,
                [
                    (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
                    (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS),
                ],
            )
                .into_response(),
        };
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed_origin.clone());
        if self.status == StatusCode::METHOD_NOT_ALLOWED {
            headers.insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        response
    }
}

// ============================================================================
// SECTION: Guards
// ============================================================================

/// Claim on an instance for the duration of a run.
#[derive(Debug)]
pub(crate) struct ActiveClaim {
    /// Shared active set.
    active: Arc<Mutex<HashSet<InstanceId>>>,
    /// Claimed instance.
    instance_id: InstanceId,
}

impl ActiveClaim {
    /// Claims `instance_id`; returns `None` when a run already holds it.
    pub(crate) fn acquire(
        active: &Arc<Mutex<HashSet<InstanceId>>>,
        instance_id: &InstanceId,
    ) -> Option<Self> {
        let inserted = active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(instance_id.clone());
        inserted.then(|| Self {
            active: Arc::clone(active),
            instance_id: instance_id.clone(),
        })
    }
}

impl Drop for ActiveClaim {
    fn drop(&mut self) {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.instance_id);
    }
}

/// Fires a cancel handle when dropped unless disarmed.
#[derive(Debug)]
pub(crate) struct CancelOnDrop {
    /// Handle to fire.
    handle: Option<CancelHandle>,
}

impl CancelOnDrop {
    /// Arms the guard.
    pub(crate) const fn new(handle: CancelHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Disarms the guard after the run finished.
    pub(crate) fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
