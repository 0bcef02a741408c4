// exec-gate-http/src/config.rs
// ============================================================================
// Module: Gate Server Configuration
// Description: Environment-driven configuration for the HTTP gate.
// Purpose: Provide strict, fail-closed config resolution with hard limits.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The HTTP gate is configured entirely from the environment: `PROFILES_ROOT`
//! names the profile directory, `AUDIT_LOG_PATH` names the append-mode audit
//! file, and optional variables override the bind address and body limit.
//! Missing or invalid configuration fails closed at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable naming the profile root directory.
pub const PROFILES_ROOT_ENV: &str = "PROFILES_ROOT";
/// Environment variable naming the audit log file.
pub const AUDIT_LOG_PATH_ENV: &str = "AUDIT_LOG_PATH";
/// Environment variable overriding the bind address.
pub const BIND_ENV: &str = "EXEC_GATE_BIND";
/// Environment variable overriding the maximum request body size.
pub const MAX_BODY_BYTES_ENV: &str = "EXEC_GATE_MAX_BODY_BYTES";

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Hard ceiling for the request body size limit.
pub const MAX_BODY_BYTES_CEILING: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Resolved HTTP gate configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateHttpConfig {
    /// Socket address the server binds to.
    pub bind: SocketAddr,
    /// Directory containing `<id>/<version>.json` profile files.
    pub profiles_root: PathBuf,
    /// Audit log file opened in append mode.
    pub audit_log_path: PathBuf,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl GateHttpConfig {
    /// Resolves configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or any
    /// value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profiles_root = PathBuf::from(require_env(PROFILES_ROOT_ENV)?);
        let audit_log_path = PathBuf::from(require_env(AUDIT_LOG_PATH_ENV)?);
        let bind_text =
            env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let max_body_bytes = match env::var(MAX_BODY_BYTES_ENV) {
            Ok(text) => text.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                variable: MAX_BODY_BYTES_ENV,
                reason: "expected an unsigned integer".to_string(),
            })?,
            Err(_) => DEFAULT_MAX_BODY_BYTES,
        };
        Self::build(bind_text.as_str(), profiles_root, audit_log_path, max_body_bytes)
    }

    /// Builds and validates a configuration from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value fails validation.
    pub fn build(
        bind: &str,
        profiles_root: PathBuf,
        audit_log_path: PathBuf,
        max_body_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let bind: SocketAddr = bind.parse().map_err(|_| ConfigError::InvalidValue {
            variable: BIND_ENV,
            reason: format!("invalid socket address: {bind}"),
        })?;
        if max_body_bytes == 0 || max_body_bytes > MAX_BODY_BYTES_CEILING {
            return Err(ConfigError::InvalidValue {
                variable: MAX_BODY_BYTES_ENV,
                reason: format!("body limit must be within 1..={MAX_BODY_BYTES_CEILING}"),
            });
        }
        if !profiles_root.is_dir() {
            return Err(ConfigError::InvalidValue {
                variable: PROFILES_ROOT_ENV,
                reason: format!("not a directory: {}", profiles_root.display()),
            });
        }
        if let Some(parent) = audit_log_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            return Err(ConfigError::InvalidValue {
                variable: AUDIT_LOG_PATH_ENV,
                reason: format!("parent directory missing: {}", parent.display()),
            });
        }
        Ok(Self {
            bind,
            profiles_root,
            audit_log_path,
            max_body_bytes,
        })
    }
}

/// Reads a required environment variable.
fn require_env(variable: &'static str) -> Result<String, ConfigError> {
    match env::var(variable) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(variable)),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration resolution errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("required environment variable missing: {0}")]
    Missing(&'static str),
    /// A variable is present but its value is invalid.
    #[error("invalid value for {variable}: {reason}")]
    InvalidValue {
        /// Offending variable name.
        variable: &'static str,
        /// Validation failure description.
        reason: String,
    },
}
