// exec-gate-core/src/runtime/gate.rs
// ============================================================================
// Module: Exec Gate Orchestrator
// Description: Fail-closed request lifecycle from raw bytes to decision.
// Purpose: Glue parsing, validation, loading, enforcement, assembly, and audit.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! The orchestrator owns the per-request state machine: parse, validate,
//! context check, profile load, enforce, assemble, audit, reply. Every
//! transition is a total function from state-so-far to either the next state
//! or a terminal deny; there is no branch that can return `ALLOW` on error.
//! An audit append is attempted for every terminal decision; if the append
//! itself fails, the reply becomes `DENY / AUDIT_WRITE_FAILED` and no record
//! is claimed to exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;

use serde_json::Value;

use crate::core::ApprovedCall;
use crate::core::AuditDraft;
use crate::core::DecisionProfile;
use crate::core::DecisionType;
use crate::core::ExecutionDecision;
use crate::core::ExecutionRequest;
use crate::core::HashDigest;
use crate::core::ProfileId;
use crate::core::ProfileVersion;
use crate::core::ReasonCode;
use crate::core::RequestId;
use crate::core::RuntimeIdentity;
use crate::core::fallback_profile_ref_hash;
use crate::core::hash_bytes;
use crate::core::hash_canonical_json;
use crate::interfaces::AuditLog;
use crate::interfaces::Clock;
use crate::interfaces::ProfileError;
use crate::interfaces::ProfileSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identity placeholder used before request validation succeeds.
const UNKNOWN: &str = "UNKNOWN";

// ============================================================================
// SECTION: Execution Gate
// ============================================================================

/// Synchronous policy enforcement gate.
///
/// The gate is stateless across requests; shared mutable state lives behind
/// the profile source (read-mostly cache) and the audit log (single writer).
pub struct ExecutionGate {
    /// Identity of the deciding build.
    runtime: RuntimeIdentity,
    /// Profile resolution backend.
    profiles: Arc<dyn ProfileSource>,
    /// Audit persistence backend.
    audit: Arc<dyn AuditLog>,
    /// Timestamp source for audit records.
    clock: Arc<dyn Clock>,
}

/// Terminal pipeline outcome awaiting audit.
struct Decided {
    /// Assembled decision.
    decision: ExecutionDecision,
    /// Request identifier for the audit record.
    request_id: RequestId,
}

impl ExecutionGate {
    /// Creates a gate over the given backends.
    #[must_use]
    pub fn new(
        runtime: RuntimeIdentity,
        profiles: Arc<dyn ProfileSource>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runtime,
            profiles,
            audit,
            clock,
        }
    }

    /// Runs the full request lifecycle over raw body bytes.
    ///
    /// This function is total: every failure mode resolves to a `DENY`
    /// decision with one of the fixed reason codes.
    #[must_use]
    pub fn execute(&self, raw: &[u8]) -> ExecutionDecision {
        let received_at = self.clock.now_utc();
        // Unanticipated faults anywhere in the pipeline fail closed.
        let decided = catch_unwind(AssertUnwindSafe(|| self.decide(raw)))
            .unwrap_or_else(|_| self.internal_error(raw));
        let decided_at = self.clock.now_utc();
        let draft = AuditDraft {
            decision: decided.decision.clone(),
            request_id: decided.request_id,
            received_at,
            decided_at,
        };
        match self.audit.append(draft) {
            Ok(_) => decided.decision,
            Err(_) => self.substitute_audit_failure(decided.decision),
        }
    }

    /// Runs the decision pipeline up to (not including) the audit append.
    fn decide(&self, raw: &[u8]) -> Decided {
        // PARSE: malformed JSON is hashed over the raw bytes.
        let Ok(value) = serde_json::from_slice::<Value>(raw) else {
            return Decided {
                decision: self.deny(
                    ReasonCode::RequestParseError,
                    hash_bytes(raw),
                    unknown_profile(),
                ),
                request_id: RequestId::new(UNKNOWN),
            };
        };

        // VALIDATE: strict schema plus non-empty string rules.
        let request = serde_json::from_value::<ExecutionRequest>(value.clone())
            .ok()
            .filter(|request| request.validate().is_ok());
        let Some(request) = request else {
            let request_hash =
                hash_canonical_json(&value).unwrap_or_else(|_| hash_bytes(raw));
            return Decided {
                decision: self.deny(
                    ReasonCode::RequestSchemaInvalid,
                    request_hash,
                    unknown_profile(),
                ),
                request_id: RequestId::new(UNKNOWN),
            };
        };

        let request_id = request.request_id.clone();
        let Ok(request_hash) = hash_canonical_json(&request) else {
            return self.internal_error(raw);
        };
        let referenced = DecisionProfile {
            id: request.profile.id.clone(),
            version: request.profile.version.clone(),
            profile_ref_hash: fallback_profile_ref_hash(),
        };

        // CTX_CHECK: recompute the snapshot digest and compare byte-exactly.
        let Ok(snapshot_hash) = hash_canonical_json(&request.context.snapshot) else {
            return self.internal_error(raw);
        };
        if snapshot_hash.as_str() != request.context.snapshot_hash {
            return Decided {
                decision: self.deny(ReasonCode::CtxHashMismatch, request_hash, referenced),
                request_id,
            };
        }

        // LOAD_PROFILE: loader failures keep the fallback reference digest.
        let loaded = match self.profiles.load(&request.profile.id, &request.profile.version) {
            Ok(loaded) => loaded,
            Err(err) => {
                return Decided {
                    decision: self.deny(reason_for_profile_error(&err), request_hash, referenced),
                    request_id,
                };
            }
        };
        let profile = DecisionProfile {
            id: request.profile.id.clone(),
            version: request.profile.version.clone(),
            profile_ref_hash: loaded.profile_ref_hash,
        };

        // ENFORCE: allowlist, controls, constraints; first failure wins.
        if let Some(reason) = super::enforce::enforce(&loaded.profile, &request) {
            return Decided {
                decision: self.deny(reason, request_hash, profile),
                request_id,
            };
        }

        // ASSEMBLE: the single success path echoes the call verbatim.
        let approved_call = ApprovedCall {
            tool_name: request.tool.name.clone(),
            tool_args: request.tool.args.clone(),
        };
        let decision = ExecutionDecision::allow(
            request_hash.clone(),
            profile.clone(),
            self.runtime.clone(),
            approved_call,
        )
        .unwrap_or_else(|_| self.deny(ReasonCode::InternalError, request_hash, profile));
        Decided {
            decision,
            request_id,
        }
    }

    /// Builds a deny decision, falling back to a zero provenance identifier
    /// if the provenance digest itself cannot be computed.
    fn deny(
        &self,
        reason_code: ReasonCode,
        request_hash: HashDigest,
        profile: DecisionProfile,
    ) -> ExecutionDecision {
        ExecutionDecision::deny(
            reason_code,
            request_hash.clone(),
            profile.clone(),
            self.runtime.clone(),
        )
        .unwrap_or_else(|_| ExecutionDecision {
            decision_type: DecisionType::Deny,
            reason_code,
            request_hash,
            provenance_id: HashDigest::zero(),
            profile,
            runtime: self.runtime.clone(),
            approved_call: None,
        })
    }

    /// Terminal outcome for unanticipated faults: raw-byte request hash and
    /// fallback profile reference.
    fn internal_error(&self, raw: &[u8]) -> Decided {
        Decided {
            decision: self.deny(ReasonCode::InternalError, hash_bytes(raw), unknown_profile()),
            request_id: RequestId::new(UNKNOWN),
        }
    }

    /// Replaces a decision whose audit append failed. The reply carries the
    /// same hashes with `AUDIT_WRITE_FAILED`; no record is claimed to exist.
    fn substitute_audit_failure(&self, decision: ExecutionDecision) -> ExecutionDecision {
        self.deny(
            ReasonCode::AuditWriteFailed,
            decision.request_hash,
            decision.profile,
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Profile identity used before the request's reference is known.
fn unknown_profile() -> DecisionProfile {
    DecisionProfile {
        id: ProfileId::new(UNKNOWN),
        version: ProfileVersion::new(UNKNOWN),
        profile_ref_hash: fallback_profile_ref_hash(),
    }
}

/// Maps loader failures onto the reason enumeration.
const fn reason_for_profile_error(err: &ProfileError) -> ReasonCode {
    match err {
        ProfileError::NotFound {
            ..
        } => ReasonCode::ProfileNotFound,
        ProfileError::Parse(_) => ReasonCode::ProfileParseError,
        ProfileError::InvalidDefault => ReasonCode::InvalidProfileDefault,
    }
}
