// exec-gate-core/src/core/decision.rs
// ============================================================================
// Module: Exec Gate Execution Decision
// Description: Decision and reason enumerations, runtime identity, assembly.
// Purpose: Build provenance-bound ALLOW/DENY decisions with enforced invariants.
// Dependencies: crate::core::{hashing, identifiers, request}, serde
// ============================================================================

//! ## Overview
//! A decision is the immutable output of one gate invocation. It binds the
//! request digest, the profile reference digest, and the runtime version into
//! a provenance identifier, and carries the approved call exactly when the
//! decision is `ALLOW`. Constructors are the only way to build a decision, so
//! the `approved_call` ⇔ `ALLOW` invariant holds by construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ProfileId;
use crate::core::identifiers::ProfileVersion;
use crate::core::identifiers::ToolName;

// ============================================================================
// SECTION: Decision Type
// ============================================================================

/// Decision disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionType {
    /// Execution is authorized.
    #[serde(rename = "ALLOW")]
    Allow,
    /// Execution is refused.
    #[serde(rename = "DENY")]
    Deny,
    /// Reserved for deployments with human-in-the-loop escalation; the core
    /// never emits it.
    #[serde(rename = "ESCALATE")]
    Escalate,
}

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Machine-verifiable reason codes. Identifiers are stable: additions are
/// backward-compatible, renames are breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    /// Happy path; pairs with `ALLOW`.
    #[serde(rename = "OK")]
    Ok,
    /// Body is not valid JSON.
    #[serde(rename = "REQUEST_PARSE_ERROR")]
    RequestParseError,
    /// JSON parsed but the request schema is invalid.
    #[serde(rename = "REQUEST_SCHEMA_INVALID")]
    RequestSchemaInvalid,
    /// Context snapshot does not match the claimed hash.
    #[serde(rename = "CTX_HASH_MISMATCH")]
    CtxHashMismatch,
    /// No profile exists for the requested `(id, version)`.
    #[serde(rename = "PROFILE_NOT_FOUND")]
    ProfileNotFound,
    /// Profile bytes are unreadable, unparseable, or schema-invalid.
    #[serde(rename = "PROFILE_PARSE_ERROR")]
    ProfileParseError,
    /// Profile parsed but its default disposition is not `DENY`.
    #[serde(rename = "INVALID_PROFILE_DEFAULT")]
    InvalidProfileDefault,
    /// No permit matches the requested tool name.
    #[serde(rename = "TOOL_NOT_ALLOWED")]
    ToolNotAllowed,
    /// A required control is missing or invalid.
    #[serde(rename = "CONTROL_REQUIRED")]
    ControlRequired,
    /// An argument rule check failed.
    #[serde(rename = "CONSTRAINT_VIOLATION")]
    ConstraintViolation,
    /// An argument rule could not be evaluated.
    #[serde(rename = "CONSTRAINT_EVAL_ERROR")]
    ConstraintEvalError,
    /// The audit append or flush failed.
    #[serde(rename = "AUDIT_WRITE_FAILED")]
    AuditWriteFailed,
    /// Any other unanticipated fault.
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

// ============================================================================
// SECTION: Runtime Identity
// ============================================================================

/// Compile-time runtime identity embedded in every decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeIdentity {
    /// Runtime name.
    pub name: String,
    /// Runtime version; the `runtime_version` input to provenance.
    pub version: String,
    /// Build identifier (git sha or build id).
    pub build: String,
}

impl RuntimeIdentity {
    /// Returns the identity of the current build.
    ///
    /// The build id may be injected at compile time through `EXEC_GATE_BUILD`.
    #[must_use]
    pub fn current() -> Self {
        Self {
            name: "exec-gate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            build: option_env!("EXEC_GATE_BUILD").unwrap_or("dev").to_string(),
        }
    }
}

// ============================================================================
// SECTION: Decision Components
// ============================================================================

/// Profile identity echoed in decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionProfile {
    /// Profile identifier (or the literal `UNKNOWN` before validation).
    pub id: ProfileId,
    /// Profile version (or the literal `UNKNOWN` before validation).
    pub version: ProfileVersion,
    /// Digest of the loaded profile bytes, or the fallback digest.
    pub profile_ref_hash: HashDigest,
}

/// Tool call echoed verbatim on `ALLOW`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApprovedCall {
    /// Tool name from the request.
    pub tool_name: ToolName,
    /// Tool arguments from the request.
    pub tool_args: Value,
}

// ============================================================================
// SECTION: Execution Decision
// ============================================================================

/// Immutable decision produced by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionDecision {
    /// Decision disposition.
    pub decision_type: DecisionType,
    /// Reason code paired with the disposition.
    pub reason_code: ReasonCode,
    /// Digest of the canonical request, or of the raw bytes for pre-schema
    /// failures.
    pub request_hash: HashDigest,
    /// Digest binding request, profile bytes, and runtime version.
    pub provenance_id: HashDigest,
    /// Profile identity for this decision.
    pub profile: DecisionProfile,
    /// Runtime identity of the deciding build.
    pub runtime: RuntimeIdentity,
    /// Present exactly when the decision is `ALLOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_call: Option<ApprovedCall>,
}

impl ExecutionDecision {
    /// Assembles an `ALLOW / OK` decision carrying the approved call.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the provenance digest cannot be computed.
    pub fn allow(
        request_hash: HashDigest,
        profile: DecisionProfile,
        runtime: RuntimeIdentity,
        approved_call: ApprovedCall,
    ) -> Result<Self, HashError> {
        let provenance_id =
            provenance_id(&request_hash, &profile.profile_ref_hash, &runtime.version)?;
        Ok(Self {
            decision_type: DecisionType::Allow,
            reason_code: ReasonCode::Ok,
            request_hash,
            provenance_id,
            profile,
            runtime,
            approved_call: Some(approved_call),
        })
    }

    /// Assembles a `DENY` decision for the given reason.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the provenance digest cannot be computed.
    pub fn deny(
        reason_code: ReasonCode,
        request_hash: HashDigest,
        profile: DecisionProfile,
        runtime: RuntimeIdentity,
    ) -> Result<Self, HashError> {
        let provenance_id =
            provenance_id(&request_hash, &profile.profile_ref_hash, &runtime.version)?;
        Ok(Self {
            decision_type: DecisionType::Deny,
            reason_code,
            request_hash,
            provenance_id,
            profile,
            runtime,
            approved_call: None,
        })
    }

    /// Checks the decision variant invariant: `approved_call` is present iff
    /// the disposition is `ALLOW`.
    #[must_use]
    pub const fn variant_invariant_holds(&self) -> bool {
        match self.decision_type {
            DecisionType::Allow => self.approved_call.is_some(),
            DecisionType::Deny | DecisionType::Escalate => self.approved_call.is_none(),
        }
    }
}

// ============================================================================
// SECTION: Provenance
// ============================================================================

/// Provenance pre-image with a fixed canonical key set.
#[derive(Serialize)]
struct ProvenanceInputs<'a> {
    /// Request digest.
    request_hash: &'a HashDigest,
    /// Profile reference digest.
    profile_ref_hash: &'a HashDigest,
    /// Runtime version string.
    runtime_version: &'a str,
}

/// Computes the provenance identifier joining a decision to its request, its
/// profile bytes, and the code that decided it. Identical inputs always yield
/// the same identifier.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn provenance_id(
    request_hash: &HashDigest,
    profile_ref_hash: &HashDigest,
    runtime_version: &str,
) -> Result<HashDigest, HashError> {
    hash_canonical_json(&ProvenanceInputs {
        request_hash,
        profile_ref_hash,
        runtime_version,
    })
}
