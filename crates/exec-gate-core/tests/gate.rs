// exec-gate-core/tests/gate.rs
// ============================================================================
// Module: Gate Orchestrator Tests
// Description: End-to-end pipeline tests from raw bytes to audited decisions.
// ============================================================================
//! ## Overview
//! Drives the orchestrator over raw request bodies and checks every terminal
//! path: the single allow path, each deny reason, fail-closed substitution on
//! audit failure, and the decision/record agreement invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use exec_gate_core::AuditDraft;
use exec_gate_core::AuditError;
use exec_gate_core::AuditLog;
use exec_gate_core::AuditRecord;
use exec_gate_core::Clock;
use exec_gate_core::DecisionType;
use exec_gate_core::ExecutionGate;
use exec_gate_core::FsProfileSource;
use exec_gate_core::MemoryAuditLog;
use exec_gate_core::ReasonCode;
use exec_gate_core::RuntimeIdentity;
use exec_gate_core::StaticProfileSource;
use exec_gate_core::core::verify_chain;
use exec_gate_core::fallback_profile_ref_hash;
use exec_gate_core::hash_bytes;
use exec_gate_core::hash_canonical_json;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Clock pinned to a fixed instant for deterministic records.
struct FixedClock;

impl Clock for FixedClock {
    fn now_utc(&self) -> String {
        "2026-02-01T10:15:30.000123Z".to_string()
    }
}

/// Audit log stub whose appends always fail.
struct FailingAuditLog;

impl AuditLog for FailingAuditLog {
    fn append(&self, _draft: AuditDraft) -> Result<AuditRecord, AuditError> {
        Err(AuditError::Write("disk full".to_string()))
    }
}

/// Writes the reference scenario profiles under the root directory.
fn write_profiles(root: &Path) {
    let example = json!({
        "profile_id": "example",
        "profile_version": "1.0.0",
        "allowed_tools": [
            {
                "name": "email.send",
                "required_controls": {"approval_token": false},
                "constraints": {
                    "arg_rules": [
                        {"path": "$.to", "type": "string", "pattern": "^[^@]+@example\\.com$"},
                        {"path": "$.subject", "type": "string", "max_len": 128}
                    ]
                }
            },
            {
                "name": "storage.put",
                "required_controls": {"approval_token": true}
            }
        ],
        "default": "DENY"
    });
    let dir = root.join("example");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("1.0.0.json"), serde_json::to_vec(&example).unwrap()).unwrap();

    let open = json!({
        "profile_id": "open",
        "profile_version": "1.0.0",
        "allowed_tools": [],
        "default": "ALLOW"
    });
    let dir = root.join("open");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("1.0.0.json"), serde_json::to_vec(&open).unwrap()).unwrap();

    let dir = root.join("corrupt");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("1.0.0.json"), b"{not json").unwrap();
}

/// Test harness bundling the gate with its in-memory audit log.
struct Harness {
    /// Gate under test.
    gate: ExecutionGate,
    /// Shared audit log for record assertions.
    audit: Arc<MemoryAuditLog>,
    /// Profile root kept alive for the gate's lifetime.
    _profiles_dir: tempfile::TempDir,
}

/// Builds a gate over the scenario profiles and a memory audit log.
fn harness() -> Harness {
    let profiles_dir = tempfile::tempdir().unwrap();
    write_profiles(profiles_dir.path());
    let audit = Arc::new(MemoryAuditLog::new(Arc::new(FixedClock)));
    let gate = ExecutionGate::new(
        RuntimeIdentity::current(),
        Arc::new(FsProfileSource::new(profiles_dir.path())),
        Arc::clone(&audit) as Arc<dyn AuditLog>,
        Arc::new(FixedClock),
    );
    Harness {
        gate,
        audit,
        _profiles_dir: profiles_dir,
    }
}

/// Builds a request body with a correct snapshot digest claim.
fn request_body(request_id: &str, tool: &str, args: Value, controls: Value) -> Vec<u8> {
    request_body_for_profile(request_id, tool, args, controls, "example", "1.0.0")
}

/// Builds a request body against an explicit profile reference.
fn request_body_for_profile(
    request_id: &str,
    tool: &str,
    args: Value,
    controls: Value,
    profile_id: &str,
    profile_version: &str,
) -> Vec<u8> {
    let snapshot = json!({"x": 1});
    let snapshot_hash = hash_canonical_json(&snapshot).unwrap();
    serde_json::to_vec(&json!({
        "request_id": request_id,
        "actor": {"principal_id": "user:1", "principal_type": "user", "attributes": {}},
        "tool": {"name": tool, "args": args},
        "profile": {"id": profile_id, "version": profile_version},
        "context": {"snapshot": snapshot, "snapshot_hash": snapshot_hash.as_str()},
        "controls": controls
    }))
    .unwrap()
}

// ============================================================================
// SECTION: Scenario Tests
// ============================================================================

/// Tests the happy path allows and echoes the call verbatim.
#[test]
fn test_allow_email_send() {
    let harness = harness();
    let body = request_body(
        "req_allow",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    );
    let decision = harness.gate.execute(&body);

    assert_eq!(decision.decision_type, DecisionType::Allow);
    assert_eq!(decision.reason_code, ReasonCode::Ok);
    let call = decision.approved_call.as_ref().unwrap();
    assert_eq!(call.tool_name.as_str(), "email.send");
    assert_eq!(call.tool_args, json!({"to": "bob@example.com", "subject": "hi"}));

    let records = harness.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_id.as_str(), "req_allow");
    assert_eq!(records[0].decision_type, DecisionType::Allow);
}

/// Tests an unlisted tool denies with TOOL_NOT_ALLOWED.
#[test]
fn test_tool_not_allowed() {
    let harness = harness();
    let body = request_body("req_denied", "db.drop_all", json!({"sure": true}), json!({}));
    let decision = harness.gate.execute(&body);

    assert_eq!(decision.decision_type, DecisionType::Deny);
    assert_eq!(decision.reason_code, ReasonCode::ToolNotAllowed);
    assert!(decision.approved_call.is_none());
}

/// Tests a permit requiring approval denies without it and allows with it.
#[test]
fn test_control_required_then_approved() {
    let harness = harness();
    let denied = harness.gate.execute(&request_body(
        "req_control",
        "storage.put",
        json!({"key": "a", "value": "b"}),
        json!({}),
    ));
    assert_eq!(denied.decision_type, DecisionType::Deny);
    assert_eq!(denied.reason_code, ReasonCode::ControlRequired);

    let allowed = harness.gate.execute(&request_body(
        "req_control_ok",
        "storage.put",
        json!({"key": "a", "value": "b"}),
        json!({"approval_token": "APPROVED"}),
    ));
    assert_eq!(allowed.decision_type, DecisionType::Allow);
    assert_eq!(allowed.reason_code, ReasonCode::Ok);
}

/// Tests an argument outside its rule denies with CONSTRAINT_VIOLATION.
#[test]
fn test_constraint_violation() {
    let harness = harness();
    let decision = harness.gate.execute(&request_body(
        "req_bad_domain",
        "email.send",
        json!({"to": "bob@gmail.com", "subject": "hi"}),
        json!({}),
    ));
    assert_eq!(decision.decision_type, DecisionType::Deny);
    assert_eq!(decision.reason_code, ReasonCode::ConstraintViolation);
}

/// Tests a tampered snapshot claim denies with CTX_HASH_MISMATCH.
#[test]
fn test_context_hash_mismatch() {
    let harness = harness();
    let mut value: Value = serde_json::from_slice(&request_body(
        "req_ctx",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    ))
    .unwrap();
    let claim = value.pointer("/context/snapshot_hash").unwrap().as_str().unwrap();
    let mut altered = claim.to_string();
    // Flip the final hex digit.
    let last = altered.pop().unwrap();
    altered.push(if last == '0' { '1' } else { '0' });
    *value.pointer_mut("/context/snapshot_hash").unwrap() = json!(altered);

    let decision = harness.gate.execute(&serde_json::to_vec(&value).unwrap());
    assert_eq!(decision.decision_type, DecisionType::Deny);
    assert_eq!(decision.reason_code, ReasonCode::CtxHashMismatch);
    // The profile was never loaded; the fallback reference digest applies.
    assert_eq!(decision.profile.profile_ref_hash, fallback_profile_ref_hash());
}

/// Tests identical requests yield identical provenance and chained records.
#[test]
fn test_determinism_and_chain() {
    let harness = harness();
    let body = request_body(
        "prov_1",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    );
    let first = harness.gate.execute(&body);
    let second = harness.gate.execute(&body);

    assert_eq!(first.provenance_id, second.provenance_id);
    assert_eq!(first.request_hash, second.request_hash);

    let records = harness.audit.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].seq, 0);
    assert_eq!(records[1].seq, 1);
    verify_chain(&records).unwrap();
}

// ============================================================================
// SECTION: Early Failure Paths
// ============================================================================

/// Tests malformed JSON denies with the raw-byte request digest.
#[test]
fn test_parse_error_hashes_raw_bytes() {
    let harness = harness();
    let raw = b"{not json" as &[u8];
    let decision = harness.gate.execute(raw);

    assert_eq!(decision.decision_type, DecisionType::Deny);
    assert_eq!(decision.reason_code, ReasonCode::RequestParseError);
    assert_eq!(decision.request_hash, hash_bytes(raw));
    assert_eq!(decision.profile.id.as_str(), "UNKNOWN");
    assert_eq!(decision.profile.profile_ref_hash, fallback_profile_ref_hash());

    // Parse failures are still audited.
    let records = harness.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason_code, ReasonCode::RequestParseError);
    assert_eq!(records[0].request_id.as_str(), "UNKNOWN");
}

/// Tests schema violations hash the canonical parsed value.
#[test]
fn test_schema_invalid_hashes_canonical_value() {
    let harness = harness();
    let value = json!({"request_id": "req_bad", "unexpected": true});
    let decision = harness.gate.execute(&serde_json::to_vec(&value).unwrap());

    assert_eq!(decision.decision_type, DecisionType::Deny);
    assert_eq!(decision.reason_code, ReasonCode::RequestSchemaInvalid);
    assert_eq!(decision.request_hash, hash_canonical_json(&value).unwrap());
}

/// Tests empty required strings are schema violations.
#[test]
fn test_empty_request_id_schema_invalid() {
    let harness = harness();
    let mut value: Value = serde_json::from_slice(&request_body(
        "placeholder",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    ))
    .unwrap();
    *value.pointer_mut("/request_id").unwrap() = json!("");
    let decision = harness.gate.execute(&serde_json::to_vec(&value).unwrap());
    assert_eq!(decision.reason_code, ReasonCode::RequestSchemaInvalid);
}

// ============================================================================
// SECTION: Profile Failure Paths
// ============================================================================

/// Tests an unknown profile reference denies with PROFILE_NOT_FOUND.
#[test]
fn test_profile_not_found() {
    let harness = harness();
    let body = request_body_for_profile(
        "req_missing",
        "email.send",
        json!({"to": "bob@example.com"}),
        json!({}),
        "example",
        "9.9.9",
    );
    let decision = harness.gate.execute(&body);

    assert_eq!(decision.reason_code, ReasonCode::ProfileNotFound);
    assert_eq!(decision.profile.id.as_str(), "example");
    assert_eq!(decision.profile.version.as_str(), "9.9.9");
    assert_eq!(decision.profile.profile_ref_hash, fallback_profile_ref_hash());
}

/// Tests corrupt profile bytes deny with PROFILE_PARSE_ERROR.
#[test]
fn test_profile_parse_error() {
    let harness = harness();
    let body = request_body_for_profile(
        "req_corrupt",
        "email.send",
        json!({"to": "bob@example.com"}),
        json!({}),
        "corrupt",
        "1.0.0",
    );
    let decision = harness.gate.execute(&body);
    assert_eq!(decision.reason_code, ReasonCode::ProfileParseError);
}

/// Tests a non-DENY profile default denies with INVALID_PROFILE_DEFAULT.
#[test]
fn test_invalid_profile_default() {
    let harness = harness();
    let body = request_body_for_profile(
        "req_open",
        "email.send",
        json!({"to": "bob@example.com"}),
        json!({}),
        "open",
        "1.0.0",
    );
    let decision = harness.gate.execute(&body);
    assert_eq!(decision.reason_code, ReasonCode::InvalidProfileDefault);
}

// ============================================================================
// SECTION: Audit Failure and Agreement
// ============================================================================

/// Tests an audit append failure substitutes AUDIT_WRITE_FAILED.
#[test]
fn test_audit_write_failure_substitutes_deny() {
    let mut profiles = StaticProfileSource::new();
    profiles.insert(
        "example",
        "1.0.0",
        serde_json::to_vec(&json!({
            "profile_id": "example",
            "profile_version": "1.0.0",
            "allowed_tools": [
                {
                    "name": "email.send",
                    "constraints": {
                        "arg_rules": [
                            {"path": "$.to", "type": "string", "pattern": "^[^@]+@example\\.com$"}
                        ]
                    }
                }
            ],
            "default": "DENY"
        }))
        .unwrap(),
    );
    let gate = ExecutionGate::new(
        RuntimeIdentity::current(),
        Arc::new(profiles),
        Arc::new(FailingAuditLog),
        Arc::new(FixedClock),
    );
    let body = request_body(
        "req_audit_down",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    );
    let decision = gate.execute(&body);

    // Fail-closed: the otherwise-allowed call is denied, hashes preserved.
    assert_eq!(decision.decision_type, DecisionType::Deny);
    assert_eq!(decision.reason_code, ReasonCode::AuditWriteFailed);
    assert!(decision.approved_call.is_none());
    assert_eq!(decision.profile.id.as_str(), "example");
}

/// Tests the decision and its audit record agree on the shared fields.
#[test]
fn test_decision_and_record_agree() {
    let harness = harness();
    let body = request_body(
        "req_agree",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    );
    let decision = harness.gate.execute(&body);
    let records = harness.audit.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];

    assert_eq!(record.decision_type, decision.decision_type);
    assert_eq!(record.reason_code, decision.reason_code);
    assert_eq!(record.provenance_id, decision.provenance_id);
    assert_eq!(record.request_hash, decision.request_hash);
    assert_eq!(record.profile_ref_hash, decision.profile.profile_ref_hash);
    assert_eq!(record.approved_call, decision.approved_call);
    assert_eq!(record.timestamps.received_at, "2026-02-01T10:15:30.000123Z");
}

/// Tests key order in the request body does not change the request digest.
#[test]
fn test_request_hash_ignores_key_order() {
    let harness = harness();
    let body = request_body(
        "req_order",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    );
    let value: Value = serde_json::from_slice(&body).unwrap();
    let reordered = reorder(&value);
    let first = harness.gate.execute(&body);
    let second = harness.gate.execute(&serde_json::to_vec(&reordered).unwrap());
    assert_eq!(first.request_hash, second.request_hash);
    assert_eq!(first.provenance_id, second.provenance_id);
}

/// Rebuilds a value with object keys inserted in reverse order.
fn reorder(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, child) in map.iter().rev() {
                out.insert(key.clone(), reorder(child));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(reorder).collect()),
        other => other.clone(),
    }
}
