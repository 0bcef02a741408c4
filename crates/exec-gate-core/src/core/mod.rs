// exec-gate-core/src/core/mod.rs
// ============================================================================
// Module: Exec Gate Core Model
// Description: Canonical data model for requests, profiles, decisions, audit.
// Purpose: Group the pure model types behind a single module path.
// Dependencies: crate::core::{audit, decision, hashing, identifiers, profile, request}
// ============================================================================

//! ## Overview
//! The core model is pure data: strict serde schemas, validation helpers, and
//! deterministic hashing. Nothing here performs I/O or reads the clock.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod decision;
pub mod hashing;
pub mod identifiers;
pub mod profile;
pub mod request;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditDraft;
pub use audit::AuditIntegrity;
pub use audit::AuditRecord;
pub use audit::AuditTimestamps;
pub use audit::ChainError;
pub use audit::verify_chain;
pub use decision::ApprovedCall;
pub use decision::DecisionProfile;
pub use decision::DecisionType;
pub use decision::ExecutionDecision;
pub use decision::ReasonCode;
pub use decision::RuntimeIdentity;
pub use decision::provenance_id;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::fallback_profile_ref_hash;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::ProfileId;
pub use identifiers::ProfileVersion;
pub use identifiers::RequestId;
pub use identifiers::ToolName;
pub use profile::ArgRule;
pub use profile::ArgRuleType;
pub use profile::Constraints;
pub use profile::ExecutionProfile;
pub use profile::ProfileSpecError;
pub use profile::RequiredControls;
pub use profile::ToolPermit;
pub use request::Actor;
pub use request::ContextEnvelope;
pub use request::Controls;
pub use request::ExecutionRequest;
pub use request::ProfileRef;
pub use request::RequestError;
pub use request::ToolCall;
