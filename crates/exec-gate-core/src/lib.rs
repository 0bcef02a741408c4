// exec-gate-core/src/lib.rs
// ============================================================================
// Module: Exec Gate Core Library
// Description: Public API surface for the Exec Gate core.
// Purpose: Expose the model, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Exec Gate core provides the deterministic decision pipeline for tool
//! invocations: canonical hashing, strict request and profile schemas,
//! allowlist and constraint enforcement, provenance-bound decision assembly,
//! and a hash-chained append-only audit log. The decision is strictly a
//! function of the request, the named profile version, and the runtime
//! identity; no time, randomness, or external state influences it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditError;
pub use interfaces::AuditLog;
pub use interfaces::Clock;
pub use interfaces::LoadedProfile;
pub use interfaces::ProfileError;
pub use interfaces::ProfileSource;
pub use interfaces::SystemClock;
pub use runtime::APPROVAL_REFERENCE_TOKEN;
pub use runtime::CachedProfileSource;
pub use runtime::ExecutionGate;
pub use runtime::FileAuditLog;
pub use runtime::FsProfileSource;
pub use runtime::MemoryAuditLog;
pub use runtime::StaticProfileSource;
pub use runtime::read_records;
