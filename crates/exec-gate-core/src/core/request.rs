// exec-gate-core/src/core/request.rs
// ============================================================================
// Module: Exec Gate Execution Request
// Description: Strict execution request model with validation helpers.
// Purpose: Define the canonical request shape submitted to the gate.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! An execution request describes who wants to invoke which tool with which
//! arguments under which policy profile. The schema is strict: unknown fields
//! anywhere reject the request, and required strings must be non-empty.
//! Requests are immutable inputs that exist for a single invocation.
//!
//! Security posture: requests are untrusted inputs; validation failures are
//! deny-causes, never panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ProfileId;
use crate::core::identifiers::ProfileVersion;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::ToolName;

// ============================================================================
// SECTION: Execution Request
// ============================================================================

/// Canonical execution request submitted to the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionRequest {
    /// Caller-supplied opaque request identifier.
    pub request_id: RequestId,
    /// Requesting principal.
    pub actor: Actor,
    /// Tool invocation under decision.
    pub tool: ToolCall,
    /// Profile reference resolved by the loader.
    pub profile: ProfileRef,
    /// Context snapshot and the caller's integrity claim over it.
    pub context: ContextEnvelope,
    /// Optional caller-presented controls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls: Option<Controls>,
    /// Optional submission timestamp. Logged only; never influences decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}

impl ExecutionRequest {
    /// Validates request invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when a required string is empty.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.request_id.as_str().is_empty() {
            return Err(RequestError::EmptyField("request_id"));
        }
        if self.actor.principal_id.is_empty() {
            return Err(RequestError::EmptyField("actor.principal_id"));
        }
        if self.actor.principal_type.is_empty() {
            return Err(RequestError::EmptyField("actor.principal_type"));
        }
        if self.tool.name.as_str().is_empty() {
            return Err(RequestError::EmptyField("tool.name"));
        }
        if self.profile.id.as_str().is_empty() {
            return Err(RequestError::EmptyField("profile.id"));
        }
        if self.profile.version.as_str().is_empty() {
            return Err(RequestError::EmptyField("profile.version"));
        }
        if self.context.snapshot_hash.is_empty() {
            return Err(RequestError::EmptyField("context.snapshot_hash"));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Request Components
// ============================================================================

/// Requesting principal and its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Actor {
    /// Principal identifier.
    pub principal_id: String,
    /// Principal type label (user, service, agent).
    pub principal_type: String,
    /// Free-form string attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Tool invocation payload. Arguments are opaque to the gate except for
/// constraint evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCall {
    /// Tool name matched against profile permits.
    pub name: ToolName,
    /// Arbitrary JSON-serializable arguments.
    pub args: Value,
}

/// Reference to the profile governing this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileRef {
    /// Profile identifier.
    pub id: ProfileId,
    /// Profile version.
    pub version: ProfileVersion,
}

/// Context snapshot with the caller's canonical-digest claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextEnvelope {
    /// Arbitrary JSON snapshot of caller context.
    pub snapshot: Value,
    /// Caller's claim about the snapshot's canonical digest.
    pub snapshot_hash: String,
}

/// Optional caller-presented controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Controls {
    /// Approval token presented for permits that require one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_token: Option<String>,
    /// Optional idempotency nonce. Logged only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Execution request validation errors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A required string field is empty.
    #[error("required field is empty: {0}")]
    EmptyField(&'static str),
}
