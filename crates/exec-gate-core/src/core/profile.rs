// exec-gate-core/src/core/profile.rs
// ============================================================================
// Module: Exec Gate Execution Profile
// Description: Profile, permit, and argument-rule specifications.
// Purpose: Define canonical profiles with fail-closed validation helpers.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! An execution profile is the static policy input resolved per request. It
//! lists tool permits in order; each permit may require controls and restrict
//! tool arguments through typed rules. Profiles are validated at load time:
//! the default disposition must be the literal `DENY`, and identifiers must
//! be non-empty.
//!
//! Security posture: profile files are trusted configuration but still parsed
//! strictly; any malformed profile fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ProfileId;
use crate::core::identifiers::ProfileVersion;
use crate::core::identifiers::ToolName;

// ============================================================================
// SECTION: Execution Profile
// ============================================================================

/// Required literal for the profile default disposition.
pub const PROFILE_DEFAULT_DENY: &str = "DENY";

/// Canonical execution profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionProfile {
    /// Profile identifier; must match the request's profile reference.
    pub profile_id: ProfileId,
    /// Profile version; must match the request's profile reference.
    pub profile_version: ProfileVersion,
    /// Ordered tool permits.
    #[serde(default)]
    pub allowed_tools: Vec<ToolPermit>,
    /// Default disposition. Must be the literal `DENY`.
    #[serde(default = "default_deny")]
    pub default: String,
}

/// Serde default for the profile disposition.
fn default_deny() -> String {
    PROFILE_DEFAULT_DENY.to_string()
}

impl ExecutionProfile {
    /// Validates the profile invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileSpecError`] when validation fails. An invalid default
    /// is reported distinctly so the gate can map it to its own reason code.
    pub fn validate(&self) -> Result<(), ProfileSpecError> {
        if self.profile_id.as_str().is_empty() {
            return Err(ProfileSpecError::EmptyField("profile_id"));
        }
        if self.profile_version.as_str().is_empty() {
            return Err(ProfileSpecError::EmptyField("profile_version"));
        }
        for permit in &self.allowed_tools {
            if permit.name.as_str().is_empty() {
                return Err(ProfileSpecError::EmptyField("allowed_tools[].name"));
            }
            if let Some(constraints) = &permit.constraints {
                for rule in &constraints.arg_rules {
                    if rule.path.is_empty() {
                        return Err(ProfileSpecError::EmptyField("arg_rules[].path"));
                    }
                }
            }
        }
        if self.default != PROFILE_DEFAULT_DENY {
            return Err(ProfileSpecError::InvalidDefault(self.default.clone()));
        }
        Ok(())
    }

    /// Returns the permit matching the tool name exactly, if any.
    #[must_use]
    pub fn permit_for(&self, tool_name: &ToolName) -> Option<&ToolPermit> {
        self.allowed_tools.iter().find(|permit| &permit.name == tool_name)
    }
}

// ============================================================================
// SECTION: Tool Permits
// ============================================================================

/// Per-tool entry granting conditional permission to invoke that tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolPermit {
    /// Tool name matched exactly against requests.
    pub name: ToolName,
    /// Controls the caller must present.
    #[serde(default)]
    pub required_controls: RequiredControls,
    /// Optional argument constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

/// Controls a permit may require from the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiredControls {
    /// Whether an approval token must accompany the request.
    #[serde(default)]
    pub approval_token: bool,
}

/// Argument constraints applied to a permitted tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    /// Rules evaluated in order; the first failure wins.
    #[serde(default)]
    pub arg_rules: Vec<ArgRule>,
}

// ============================================================================
// SECTION: Argument Rules
// ============================================================================

/// Rule restricting the shape of a single tool argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgRule {
    /// Argument path; only `$.<key>` top-level lookups are supported.
    pub path: String,
    /// Expected value type.
    #[serde(rename = "type")]
    pub rule_type: ArgRuleType,
    /// Regex tested from the start of string values (unanchored at the end).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Maximum string length in code points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u64>,
    /// Allowed string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Argument rule value types.
///
/// The catch-all variant absorbs unrecognized type labels at parse time;
/// evaluating such a rule is a fatal rule error, not a silent pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgRuleType {
    /// Value must be a JSON string.
    String,
    /// Value must be a JSON number. Booleans are not numbers.
    Number,
    /// Value must be strictly a JSON boolean.
    Bool,
    /// Unrecognized type label retained for fail-closed evaluation.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Profile validation errors.
#[derive(Debug, Error)]
pub enum ProfileSpecError {
    /// A required string field is empty.
    #[error("required profile field is empty: {0}")]
    EmptyField(&'static str),
    /// The profile default is not the literal `DENY`.
    #[error("profile default must be DENY, found {0:?}")]
    InvalidDefault(String),
}
