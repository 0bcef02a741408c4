// exec-gate-core/src/core/hashing.rs
// ============================================================================
// Module: Exec Gate Canonical Hashing
// Description: RFC 8785 JSON canonicalization and prefixed SHA-256 digests.
// Purpose: Provide deterministic hashes for requests, profiles, and audit records.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every digest the gate emits or compares is computed over RFC 8785 (JCS)
//! canonical JSON, so semantically equivalent values hash identically across
//! key reorderings. Raw payloads (unparseable request bodies, on-disk profile
//! bytes) are hashed directly over their bytes.
//!
//! Digests travel as `sha256:<64 lowercase hex digits>` strings; that string
//! form is the wire format for `request_hash`, `profile_ref_hash`,
//! `provenance_id`, and the audit chain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Algorithm prefix carried by every digest string.
pub const HASH_PREFIX: &str = "sha256:";

/// Prefixed, lowercase-hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl HashDigest {
    /// Creates a digest from raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut out = String::with_capacity(HASH_PREFIX.len() + bytes.len() * 2);
        out.push_str(HASH_PREFIX);
        for byte in bytes {
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
        Self(out)
    }

    /// Returns the zero sentinel used as `prev_hash` for the first audit record.
    #[must_use]
    pub fn zero() -> Self {
        let mut out = String::with_capacity(HASH_PREFIX.len() + 64);
        out.push_str(HASH_PREFIX);
        for _ in 0..64 {
            out.push('0');
        }
        Self(out)
    }

    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails. Values
/// containing non-finite numbers cannot be serialized and are rejected here.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes raw bytes.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    HashDigest::from_bytes(&digest)
}

/// Hashes the canonical JSON form of a serializable value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

/// Returns the fallback profile reference hash: the digest of canonical `{}`.
///
/// Substituted whenever the profile loader fails, so every decision record
/// stays well-formed.
#[must_use]
pub fn fallback_profile_ref_hash() -> HashDigest {
    hash_bytes(b"{}")
}
