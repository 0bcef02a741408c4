// exec-gate-http/src/server.rs
// ============================================================================
// Module: Gate HTTP Server
// Description: axum transport exposing POST /v1/execute.
// Purpose: Serve execution decisions over HTTP with canonical JSON replies.
// Dependencies: exec-gate-core, axum, tokio
// ============================================================================

//! ## Overview
//! The HTTP server is a thin transport over the core gate. Every well-formed
//! exchange replies `200` with the decision as canonical JSON; allow/deny
//! travels in the application-level `decision_type`, and non-`200` statuses
//! are reserved for transport faults outside gate control (oversized bodies,
//! serialization failures). Gate work runs on the blocking pool so an
//! abandoned connection cannot cancel an in-flight audit append.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use exec_gate_core::CachedProfileSource;
use exec_gate_core::ExecutionGate;
use exec_gate_core::FileAuditLog;
use exec_gate_core::FsProfileSource;
use exec_gate_core::RuntimeIdentity;
use exec_gate_core::SystemClock;
use thiserror::Error;

use crate::config::GateHttpConfig;
use crate::log::NoopLogSink;
use crate::log::RequestLogEvent;
use crate::log::RequestLogEventParams;
use crate::log::RequestLogSink;
use crate::log::StderrLogSink;

// ============================================================================
// SECTION: Gate Server
// ============================================================================

/// HTTP gate server instance.
pub struct GateServer {
    /// Resolved configuration.
    config: GateHttpConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

/// Shared state for request handlers.
struct ServerState {
    /// Core gate executing the decision pipeline.
    gate: Arc<ExecutionGate>,
    /// Operational log sink.
    log: Arc<dyn RequestLogSink>,
}

impl GateServer {
    /// Builds a server from configuration with stderr request logging.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when initialization fails.
    pub fn from_config(config: GateHttpConfig) -> Result<Self, ServerError> {
        Self::from_config_with_log(config, Arc::new(StderrLogSink))
    }

    /// Builds a server with a custom request log sink.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when initialization fails.
    pub fn from_config_with_log(
        config: GateHttpConfig,
        log: Arc<dyn RequestLogSink>,
    ) -> Result<Self, ServerError> {
        let clock = Arc::new(SystemClock);
        let profiles =
            CachedProfileSource::new(FsProfileSource::new(config.profiles_root.clone()));
        let audit = FileAuditLog::open(&config.audit_log_path, clock.clone())
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let gate = ExecutionGate::new(
            RuntimeIdentity::current(),
            Arc::new(profiles),
            Arc::new(audit),
            clock,
        );
        Ok(Self {
            config,
            state: Arc::new(ServerState {
                gate: Arc::new(gate),
                log,
            }),
        })
    }

    /// Builds a server with quiet logging, for tests and embedding.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when initialization fails.
    pub fn from_config_quiet(config: GateHttpConfig) -> Result<Self, ServerError> {
        Self::from_config_with_log(config, Arc::new(NoopLogSink))
    }

    /// Serves requests on the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the server fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_on(listener).await
    }

    /// Serves requests on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the server fails.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        axum::serve(listener, app)
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }

    /// Returns the axum router for this server.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/execute", post(handle_execute))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .with_state(Arc::clone(&self.state))
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles `POST /v1/execute`.
async fn handle_execute(State(state): State<Arc<ServerState>>, bytes: Bytes) -> Response {
    let gate = Arc::clone(&state.gate);
    let request_bytes = bytes.len();
    // The audit append must complete even if the caller disconnects; the
    // blocking task keeps running after the handler future is dropped.
    let decision = match tokio::task::spawn_blocking(move || gate.execute(&bytes)).await {
        Ok(decision) => decision,
        Err(_) => {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let Ok(body) = serde_jcs::to_vec(&decision) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    state.log.record(&RequestLogEvent::new(RequestLogEventParams {
        decision_type: decision.decision_type,
        reason_code: decision.reason_code,
        provenance_id: decision.provenance_id.as_str().to_string(),
        request_bytes,
        response_bytes: body.len(),
    }));
    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gate server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Initialization failed.
    #[error("gate server init failed: {0}")]
    Init(String),
    /// Transport failure while binding or serving.
    #[error("gate server transport failure: {0}")]
    Transport(String),
}
