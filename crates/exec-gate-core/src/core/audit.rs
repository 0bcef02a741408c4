// exec-gate-core/src/core/audit.rs
// ============================================================================
// Module: Exec Gate Audit Records
// Description: Append-only audit record model with hash-chain integrity.
// Purpose: Define sequenced, chained records and their digest computation.
// Dependencies: crate::core::{decision, hashing, identifiers}, serde
// ============================================================================

//! ## Overview
//! Every terminal decision is mirrored into exactly one audit record. Records
//! are sequenced from 0 and chained: each record's `prev_hash` is the
//! `record_hash` of its predecessor (the zero sentinel for the first record),
//! and `record_hash` covers the canonical record with `integrity` reduced to
//! `{prev_hash}`. Records are never mutated after append; readers rebuild the
//! chain by re-hashing in order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::decision::ApprovedCall;
use crate::core::decision::DecisionType;
use crate::core::decision::ExecutionDecision;
use crate::core::decision::ReasonCode;
use crate::core::decision::RuntimeIdentity;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ProfileId;
use crate::core::identifiers::ProfileVersion;
use crate::core::identifiers::RequestId;

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// Timestamps captured across one gate invocation. UTC ISO-8601 with
/// sub-second precision; inputs to `record_hash` only, never to decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditTimestamps {
    /// Captured at request entry.
    pub received_at: String,
    /// Captured after decision assembly.
    pub decided_at: String,
    /// Captured immediately before record hash computation.
    pub logged_at: String,
}

/// Hash-chain linkage for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditIntegrity {
    /// `record_hash` of the previous record, or the zero sentinel at `seq` 0.
    pub prev_hash: HashDigest,
    /// Canonical digest of this record (with `integrity` reduced to
    /// `{prev_hash}`).
    pub record_hash: HashDigest,
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditRecord {
    /// Provenance identifier shared with the decision.
    pub provenance_id: HashDigest,
    /// Sequence number assigned at append, contiguous from 0.
    pub seq: u64,
    /// Request identifier (or the literal `UNKNOWN` before validation).
    pub request_id: RequestId,
    /// Request digest shared with the decision.
    pub request_hash: HashDigest,
    /// Profile identifier.
    pub profile_id: ProfileId,
    /// Profile version.
    pub profile_version: ProfileVersion,
    /// Profile reference digest.
    pub profile_ref_hash: HashDigest,
    /// Decision disposition.
    pub decision_type: DecisionType,
    /// Decision reason code.
    pub reason_code: ReasonCode,
    /// Approved call echoed on `ALLOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_call: Option<ApprovedCall>,
    /// Runtime identity of the deciding build.
    pub runtime: RuntimeIdentity,
    /// Invocation timestamps.
    pub timestamps: AuditTimestamps,
    /// Hash-chain linkage.
    pub integrity: AuditIntegrity,
}

// ============================================================================
// SECTION: Audit Draft
// ============================================================================

/// Record content staged before append. The log assigns `seq`, stamps
/// `logged_at`, and computes the chain linkage under its writer lock.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    /// Decision mirrored into the record.
    pub decision: ExecutionDecision,
    /// Request identifier (or the literal `UNKNOWN` before validation).
    pub request_id: RequestId,
    /// Captured at request entry.
    pub received_at: String,
    /// Captured after decision assembly.
    pub decided_at: String,
}

impl AuditDraft {
    /// Materializes the record for a given sequence slot and chain position.
    #[must_use]
    pub fn into_record(
        self,
        seq: u64,
        prev_hash: HashDigest,
        record_hash: HashDigest,
        logged_at: String,
    ) -> AuditRecord {
        AuditRecord {
            provenance_id: self.decision.provenance_id,
            seq,
            request_id: self.request_id,
            request_hash: self.decision.request_hash,
            profile_id: self.decision.profile.id,
            profile_version: self.decision.profile.version,
            profile_ref_hash: self.decision.profile.profile_ref_hash,
            decision_type: self.decision.decision_type,
            reason_code: self.decision.reason_code,
            approved_call: self.decision.approved_call,
            runtime: self.decision.runtime,
            timestamps: AuditTimestamps {
                received_at: self.received_at,
                decided_at: self.decided_at,
                logged_at,
            },
            integrity: AuditIntegrity {
                prev_hash,
                record_hash,
            },
        }
    }
}

// ============================================================================
// SECTION: Record Hashing
// ============================================================================

/// Computes the canonical digest of a record's hash pre-image: the full
/// record with `integrity` reduced to `{prev_hash}`.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn compute_record_hash(
    record_fields: &Value,
    prev_hash: &HashDigest,
) -> Result<HashDigest, HashError> {
    let mut preimage = match record_fields {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    let mut integrity = Map::new();
    integrity.insert(
        "prev_hash".to_string(),
        Value::String(prev_hash.as_str().to_string()),
    );
    preimage.insert("integrity".to_string(), Value::Object(integrity));
    hash_canonical_json(&Value::Object(preimage))
}

/// Recomputes the digest a finished record must carry.
///
/// # Errors
///
/// Returns [`HashError`] when the record cannot be serialized.
pub fn expected_record_hash(record: &AuditRecord) -> Result<HashDigest, HashError> {
    let value = serde_json::to_value(record)
        .map_err(|err| HashError::Canonicalization(err.to_string()))?;
    compute_record_hash(&value, &record.integrity.prev_hash)
}

// ============================================================================
// SECTION: Chain Verification
// ============================================================================

/// Audit chain verification errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Sequence numbers are not contiguous from 0.
    #[error("audit chain sequence gap at position {position}: expected {expected}, found {found}")]
    SequenceGap {
        /// Position of the offending record in the slice.
        position: usize,
        /// Expected sequence value.
        expected: u64,
        /// Observed sequence value.
        found: u64,
    },
    /// A record's `prev_hash` does not match its predecessor.
    #[error("audit chain broken at seq {seq}: prev_hash does not match predecessor")]
    BrokenLink {
        /// Sequence of the offending record.
        seq: u64,
    },
    /// A record's `record_hash` does not match its contents.
    #[error("audit record tampered at seq {seq}: record_hash does not match contents")]
    RecordTampered {
        /// Sequence of the offending record.
        seq: u64,
    },
    /// A record could not be re-hashed.
    #[error("audit chain hash failure at seq {seq}: {source}")]
    Hash {
        /// Sequence of the offending record.
        seq: u64,
        /// Underlying hash error.
        source: HashError,
    },
}

/// Verifies an ordered slice of records: contiguous sequence from 0, linked
/// `prev_hash` values, and content digests matching `record_hash`.
///
/// # Errors
///
/// Returns [`ChainError`] describing the first defect found.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), ChainError> {
    let mut prev = HashDigest::zero();
    let mut expected_seq: u64 = 0;
    for (position, record) in records.iter().enumerate() {
        if record.seq != expected_seq {
            return Err(ChainError::SequenceGap {
                position,
                expected: expected_seq,
                found: record.seq,
            });
        }
        if record.integrity.prev_hash != prev {
            return Err(ChainError::BrokenLink {
                seq: record.seq,
            });
        }
        let recomputed = expected_record_hash(record).map_err(|source| ChainError::Hash {
            seq: record.seq,
            source,
        })?;
        if recomputed != record.integrity.record_hash {
            return Err(ChainError::RecordTampered {
                seq: record.seq,
            });
        }
        prev = record.integrity.record_hash.clone();
        expected_seq = expected_seq.saturating_add(1);
    }
    Ok(())
}
