// exec-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Exec Gate Interfaces
// Description: Seams for profile storage, audit persistence, and time.
// Purpose: Define the contract surfaces used by the gate runtime.
// Dependencies: crate::core, serde, thiserror, time
// ============================================================================

//! ## Overview
//! Interfaces define how the gate integrates with storage and the clock
//! without embedding backend details. Implementations must be deterministic
//! for identical inputs and fail closed on missing or invalid data. The
//! decision pipeline itself never reads wall-clock time; timestamps enter
//! only through [`Clock`] and feed only audit records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::core::AuditDraft;
use crate::core::AuditRecord;
use crate::core::ExecutionProfile;
use crate::core::HashDigest;
use crate::core::ProfileId;
use crate::core::ProfileVersion;

// ============================================================================
// SECTION: Profile Source
// ============================================================================

/// A profile resolved by a source, paired with its reference digest.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile {
    /// Parsed and validated profile.
    pub profile: ExecutionProfile,
    /// Digest of the exact bytes the profile was loaded from.
    pub profile_ref_hash: HashDigest,
}

/// Profile resolution errors. Each variant maps to exactly one reason code.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No profile exists for the requested `(id, version)`.
    #[error("profile not found: {id}/{version}")]
    NotFound {
        /// Requested profile identifier.
        id: String,
        /// Requested profile version.
        version: String,
    },
    /// Profile bytes are unreadable, unparseable, or schema-invalid.
    #[error("profile parse error: {0}")]
    Parse(String),
    /// Profile parsed but its default disposition is not `DENY`.
    #[error("profile default must be DENY")]
    InvalidDefault,
}

/// Content-addressed profile source. For a given `(id, version)` a source
/// must return the same bytes, and hence the same reference digest, across
/// calls; implementations may cache aggressively.
pub trait ProfileSource: Send + Sync {
    /// Resolves a profile by identifier and version.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] when resolution fails.
    fn load(&self, id: &ProfileId, version: &ProfileVersion) -> Result<LoadedProfile, ProfileError>;
}

// ============================================================================
// SECTION: Audit Log
// ============================================================================

/// Audit persistence errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Append or flush failed.
    #[error("audit write failed: {0}")]
    Write(String),
    /// Existing log content could not be read back.
    #[error("audit log corrupt: {0}")]
    Corrupt(String),
}

/// Append-only, sequenced, hash-chained audit log.
///
/// `append` is serialized: concurrent callers observe a single total order
/// with contiguous sequence numbers, and the record is durable before the
/// call returns.
pub trait AuditLog: Send + Sync {
    /// Appends a record built from the draft, assigning the next sequence
    /// number and chaining it to the log tail.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the record could not be made durable; in
    /// that case no record is claimed to exist.
    fn append(&self, draft: AuditDraft) -> Result<AuditRecord, AuditError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Timestamp format: UTC ISO-8601 with fixed microsecond precision.
const UTC_MICROS: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);

/// Source of UTC ISO-8601 timestamps for audit records.
///
/// Timestamps never influence decisions; they feed only the audit record and
/// its `record_hash`.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time as an ISO-8601 string with sub-second
    /// precision.
    fn now_utc(&self) -> String;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> String {
        let now = OffsetDateTime::now_utc();
        now.format(UTC_MICROS).unwrap_or_else(|_| String::from("1970-01-01T00:00:00.000000Z"))
    }
}
