// exec-gate-http/src/log.rs
// ============================================================================
// Module: Gate Request Logging
// Description: Structured request log events for the HTTP gate.
// Purpose: Emit JSON-line operational logs without hard dependencies.
// Dependencies: exec-gate-core, serde
// ============================================================================

//! ## Overview
//! This module defines request log payloads and sinks for the HTTP gate.
//! Events are operational telemetry only; the tamper-evident record of each
//! decision lives in the core audit log, never here. Payload contents are
//! limited to decision metadata so argument values are not leaked into
//! operator logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use exec_gate_core::DecisionType;
use exec_gate_core::ReasonCode;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request log event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Decision disposition.
    pub decision_type: DecisionType,
    /// Decision reason code.
    pub reason_code: ReasonCode,
    /// Provenance identifier of the decision.
    pub provenance_id: String,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Inputs required to construct a request log event.
pub struct RequestLogEventParams {
    /// Decision disposition.
    pub decision_type: DecisionType,
    /// Decision reason code.
    pub reason_code: ReasonCode,
    /// Provenance identifier of the decision.
    pub provenance_id: String,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

impl RequestLogEvent {
    /// Creates a new request log event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestLogEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "gate_request",
            timestamp_ms,
            decision_type: params.decision_type,
            reason_code: params.reason_code,
            provenance_id: params.provenance_id,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink for request log events.
pub trait RequestLogSink: Send + Sync {
    /// Records a request log event.
    fn record(&self, event: &RequestLogEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrLogSink;

impl RequestLogSink for StderrLogSink {
    fn record(&self, event: &RequestLogEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op sink.
pub struct NoopLogSink;

impl RequestLogSink for NoopLogSink {
    fn record(&self, _event: &RequestLogEvent) {}
}
