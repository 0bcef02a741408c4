// exec-gate-core/src/runtime/enforce.rs
// ============================================================================
// Module: Exec Gate Enforcement Engine
// Description: Allowlist, required-control, and argument-constraint checks.
// Purpose: Evaluate a validated request against a loaded profile deterministically.
// Dependencies: crate::core, regex, subtle
// ============================================================================

//! ## Overview
//! Enforcement runs only on a fully validated request against a loaded
//! profile. Three phases evaluate in fixed order and the first failure wins:
//! allowlist lookup, required controls, argument constraints. All checks are
//! pure functions of their inputs; constrained fields fail closed when
//! missing or null.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::core::ArgRule;
use crate::core::ArgRuleType;
use crate::core::ExecutionProfile;
use crate::core::ExecutionRequest;
use crate::core::ReasonCode;
use crate::core::ToolPermit;

// ============================================================================
// SECTION: Reference Control
// ============================================================================

/// Reference approval literal. Deployments substitute a real verifier; the
/// contract is only that control failure maps to `CONTROL_REQUIRED`.
pub const APPROVAL_REFERENCE_TOKEN: &str = "APPROVED";

// ============================================================================
// SECTION: Enforcement
// ============================================================================

/// Evaluates the full enforcement sequence. Returns the deny reason for the
/// first failing phase, or `None` when the request passes all checks.
#[must_use]
pub fn enforce(profile: &ExecutionProfile, request: &ExecutionRequest) -> Option<ReasonCode> {
    let Some(permit) = profile.permit_for(&request.tool.name) else {
        return Some(ReasonCode::ToolNotAllowed);
    };
    if let Some(reason) = check_required_controls(request, permit) {
        return Some(reason);
    }
    enforce_constraints(&request.tool.args, permit)
}

/// Checks the controls a permit requires from the caller.
#[must_use]
pub fn check_required_controls(
    request: &ExecutionRequest,
    permit: &ToolPermit,
) -> Option<ReasonCode> {
    if permit.required_controls.approval_token {
        let token = request
            .controls
            .as_ref()
            .and_then(|controls| controls.approval_token.as_deref())
            .filter(|token| !token.is_empty());
        let Some(token) = token else {
            return Some(ReasonCode::ControlRequired);
        };
        let matches: bool =
            token.as_bytes().ct_eq(APPROVAL_REFERENCE_TOKEN.as_bytes()).into();
        if !matches {
            return Some(ReasonCode::ControlRequired);
        }
    }
    None
}

/// Evaluates the permit's argument rules in order against the tool args.
#[must_use]
pub fn enforce_constraints(args: &Value, permit: &ToolPermit) -> Option<ReasonCode> {
    // A permit without constraints passes trivially.
    let rules = &permit.constraints.as_ref()?.arg_rules;
    for rule in rules {
        if let Err(failure) = evaluate_rule(args, rule) {
            return Some(match failure {
                ConstraintFailure::Violation => ReasonCode::ConstraintViolation,
                ConstraintFailure::EvalError => ReasonCode::ConstraintEvalError,
            });
        }
    }
    None
}

// ============================================================================
// SECTION: Rule Evaluation
// ============================================================================

/// Outcome of a single failed rule check.
enum ConstraintFailure {
    /// The constrained value violates the rule.
    Violation,
    /// The rule itself could not be evaluated.
    EvalError,
}

/// Evaluates one rule against the tool args.
fn evaluate_rule(args: &Value, rule: &ArgRule) -> Result<(), ConstraintFailure> {
    let value = resolve_path(args, &rule.path)?;
    // Missing or null fails closed for constrained fields.
    let Some(value) = value else {
        return Err(ConstraintFailure::Violation);
    };
    if value.is_null() {
        return Err(ConstraintFailure::Violation);
    }
    match rule.rule_type {
        ArgRuleType::String => check_string(value, rule),
        ArgRuleType::Number => check_number(value, rule),
        ArgRuleType::Bool => match value {
            Value::Bool(_) => Ok(()),
            _ => Err(ConstraintFailure::Violation),
        },
        ArgRuleType::Unknown => Err(ConstraintFailure::EvalError),
    }
}

/// Resolves a rule path against the args. Only `$.<key>` top-level lookups
/// are supported; anything else is an evaluation error.
fn resolve_path<'a>(args: &'a Value, path: &str) -> Result<Option<&'a Value>, ConstraintFailure> {
    let Some(key) = path.strip_prefix("$.") else {
        return Err(ConstraintFailure::EvalError);
    };
    if key.is_empty() || key.contains('.') || key.contains('[') {
        return Err(ConstraintFailure::EvalError);
    }
    let Value::Object(map) = args else {
        return Err(ConstraintFailure::EvalError);
    };
    Ok(map.get(key))
}

/// Checks a string-typed rule: length cap (code points), enum membership,
/// then pattern.
fn check_string(value: &Value, rule: &ArgRule) -> Result<(), ConstraintFailure> {
    let Value::String(text) = value else {
        return Err(ConstraintFailure::Violation);
    };
    if let Some(max_len) = rule.max_len {
        let length = u64::try_from(text.chars().count()).unwrap_or(u64::MAX);
        if length > max_len {
            return Err(ConstraintFailure::Violation);
        }
    }
    if let Some(allowed) = &rule.r#enum
        && !allowed.iter().any(|candidate| candidate == text)
    {
        return Err(ConstraintFailure::Violation);
    }
    if let Some(pattern) = &rule.pattern {
        // Anchored at position 0 only; a trailing remainder still matches.
        let anchored = format!("\\A(?:{pattern})");
        let regex = Regex::new(&anchored).map_err(|_| ConstraintFailure::EvalError)?;
        if !regex.is_match(text) {
            return Err(ConstraintFailure::Violation);
        }
    }
    Ok(())
}

/// Checks a number-typed rule with inclusive bounds compared as doubles.
fn check_number(value: &Value, rule: &ArgRule) -> Result<(), ConstraintFailure> {
    let Value::Number(number) = value else {
        return Err(ConstraintFailure::Violation);
    };
    let Some(numeric) = number.as_f64() else {
        return Err(ConstraintFailure::EvalError);
    };
    if let Some(min) = rule.min
        && numeric < min
    {
        return Err(ConstraintFailure::Violation);
    }
    if let Some(max) = rule.max
        && numeric > max
    {
        return Err(ConstraintFailure::Violation);
    }
    Ok(())
}
