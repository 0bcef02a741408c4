// exec-gate-core/src/runtime/profiles.rs
// ============================================================================
// Module: Exec Gate Profile Loader
// Description: Filesystem and in-memory profile sources with a write-once cache.
// Purpose: Resolve (profile_id, version) to parsed profiles and reference digests.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! Profiles are content-addressed: a `(id, version)` pair always resolves to
//! the same bytes and therefore the same reference digest. The filesystem
//! source reads `<root>/<id>/<version>.json` and hashes the exact on-disk
//! bytes; the cache installs immutable entries once and never invalidates,
//! because versions are immutable.
//!
//! Security posture: identifiers come from untrusted requests and are
//! constrained to single path components before touching the filesystem.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use crate::core::ExecutionProfile;
use crate::core::ProfileId;
use crate::core::ProfileSpecError;
use crate::core::ProfileVersion;
use crate::core::hash_bytes;
use crate::interfaces::LoadedProfile;
use crate::interfaces::ProfileError;
use crate::interfaces::ProfileSource;

// ============================================================================
// SECTION: Filesystem Source
// ============================================================================

/// Profile source reading canonical-JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FsProfileSource {
    /// Directory containing `<id>/<version>.json` profile files.
    root: PathBuf,
}

impl FsProfileSource {
    /// Creates a filesystem source rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Returns the profile file path for an id/version pair, rejecting
    /// identifiers that are not plain path components.
    fn resolve_path(&self, id: &ProfileId, version: &ProfileVersion) -> Option<PathBuf> {
        if !is_plain_component(id.as_str()) || !is_plain_component(version.as_str()) {
            return None;
        }
        let mut path = self.root.clone();
        path.push(id.as_str());
        path.push(format!("{}.json", version.as_str()));
        Some(path)
    }
}

impl ProfileSource for FsProfileSource {
    fn load(&self, id: &ProfileId, version: &ProfileVersion) -> Result<LoadedProfile, ProfileError> {
        let not_found = || ProfileError::NotFound {
            id: id.as_str().to_string(),
            version: version.as_str().to_string(),
        };
        let Some(path) = self.resolve_path(id, version) else {
            return Err(not_found());
        };
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(ProfileError::Parse(format!("profile read failed: {err}"))),
        };
        parse_profile_bytes(&bytes, id, version)
    }
}

/// Parses, validates, and cross-checks profile bytes against the requested
/// identity. The reference digest covers the exact input bytes.
fn parse_profile_bytes(
    bytes: &[u8],
    id: &ProfileId,
    version: &ProfileVersion,
) -> Result<LoadedProfile, ProfileError> {
    let profile_ref_hash = hash_bytes(bytes);
    let profile: ExecutionProfile = serde_json::from_slice(bytes)
        .map_err(|err| ProfileError::Parse(format!("profile json invalid: {err}")))?;
    match profile.validate() {
        Ok(()) => {}
        Err(ProfileSpecError::InvalidDefault(_)) => return Err(ProfileError::InvalidDefault),
        Err(err) => return Err(ProfileError::Parse(err.to_string())),
    }
    if profile.profile_id != *id || profile.profile_version != *version {
        return Err(ProfileError::Parse(format!(
            "profile body identifies {}/{}, requested {}/{}",
            profile.profile_id, profile.profile_version, id, version
        )));
    }
    Ok(LoadedProfile {
        profile,
        profile_ref_hash,
    })
}

/// Returns whether the identifier is usable as a single path component.
fn is_plain_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
        && !value.contains('\0')
}

// ============================================================================
// SECTION: Caching Source
// ============================================================================

/// Write-once cache in front of another profile source.
///
/// Entries are immutable and never invalidated; a changed profile must carry
/// a new version string. Only successful loads are cached, so transient
/// filesystem errors stay retryable.
pub struct CachedProfileSource<S> {
    /// Inner source consulted on cache miss.
    inner: S,
    /// Installed entries keyed by `(id, version)`.
    entries: RwLock<HashMap<(String, String), Arc<LoadedProfile>>>,
}

impl<S: ProfileSource> CachedProfileSource<S> {
    /// Wraps a profile source with a write-once cache.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<S: ProfileSource> ProfileSource for CachedProfileSource<S> {
    fn load(&self, id: &ProfileId, version: &ProfileVersion) -> Result<LoadedProfile, ProfileError> {
        let key = (id.as_str().to_string(), version.as_str().to_string());
        if let Ok(entries) = self.entries.read()
            && let Some(entry) = entries.get(&key)
        {
            return Ok(entry.as_ref().clone());
        }
        let loaded = self.inner.load(id, version)?;
        if let Ok(mut entries) = self.entries.write() {
            // Cache misses are idempotent; the first writer wins.
            entries.entry(key).or_insert_with(|| Arc::new(loaded.clone()));
        }
        Ok(loaded)
    }
}

// ============================================================================
// SECTION: Static Source
// ============================================================================

/// In-memory profile source for tests and embedded fixtures.
#[derive(Debug, Default)]
pub struct StaticProfileSource {
    /// Profile bytes keyed by `(id, version)`.
    profiles: HashMap<(String, String), Vec<u8>>,
}

impl StaticProfileSource {
    /// Creates an empty static source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers profile bytes for an id/version pair.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        version: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) {
        self.profiles.insert((id.into(), version.into()), bytes.into());
    }
}

impl ProfileSource for StaticProfileSource {
    fn load(&self, id: &ProfileId, version: &ProfileVersion) -> Result<LoadedProfile, ProfileError> {
        let key = (id.as_str().to_string(), version.as_str().to_string());
        let Some(bytes) = self.profiles.get(&key) else {
            return Err(ProfileError::NotFound {
                id: id.as_str().to_string(),
                version: version.as_str().to_string(),
            });
        };
        parse_profile_bytes(bytes, id, version)
    }
}
