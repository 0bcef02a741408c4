// exec-gate-http/tests/execute.rs
// ============================================================================
// Module: HTTP Execute Endpoint Tests
// Description: End-to-end scenarios over a live HTTP server.
// ============================================================================
//! ## Overview
//! Boots the gate server on an ephemeral port and drives the reference
//! scenarios over real HTTP: allow, tool-not-allowed, control-required,
//! constraint violation, context mismatch, determinism, and the transport
//! contract (200-always, canonical JSON body, chained audit file).

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
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use exec_gate_core::core::verify_chain;
use exec_gate_core::hash_canonical_json;
use exec_gate_core::read_records;
use exec_gate_http::GateHttpConfig;
use exec_gate_http::GateServer;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Running server handle for one test.
struct Harness {
    /// Base URL of the live server.
    url: String,
    /// Audit log path for record assertions.
    audit_path: PathBuf,
    /// Temp directory kept alive for the server's lifetime.
    _dir: tempfile::TempDir,
}

/// Writes the reference scenario profile under the root directory.
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
}

/// Boots a quiet server on an ephemeral port.
async fn boot() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let profiles_root = dir.path().join("profiles");
    fs::create_dir_all(&profiles_root).unwrap();
    write_profiles(&profiles_root);
    let audit_path = dir.path().join("audit.log");

    let config = GateHttpConfig::build(
        "127.0.0.1:0",
        profiles_root,
        audit_path.clone(),
        64 * 1024,
    )
    .unwrap();
    let server = GateServer::from_config_quiet(config).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve_on(listener).await;
    });

    Harness {
        url: format!("http://{addr}/v1/execute"),
        audit_path,
        _dir: dir,
    }
}

/// Builds a request body with a correct snapshot digest claim.
fn request_body(request_id: &str, tool: &str, args: Value, controls: Value) -> Value {
    let snapshot = json!({"x": 1});
    let snapshot_hash = hash_canonical_json(&snapshot).unwrap();
    json!({
        "request_id": request_id,
        "actor": {"principal_id": "user:1", "principal_type": "user", "attributes": {}},
        "tool": {"name": tool, "args": args},
        "profile": {"id": "example", "version": "1.0.0"},
        "context": {"snapshot": snapshot, "snapshot_hash": snapshot_hash.as_str()},
        "controls": controls
    })
}

/// Posts a JSON body and returns status plus parsed decision.
async fn post(harness: &Harness, body: &[u8]) -> (reqwest::StatusCode, Value) {
    let client = reqwest::Client::new();
    let response = client
        .post(&harness.url)
        .header("content-type", "application/json")
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    let status = response.status();
    let decision: Value = response.json().await.unwrap();
    (status, decision)
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

/// Tests the happy path allows and echoes the call arguments.
#[tokio::test]
async fn test_allow_email_send() {
    let harness = boot().await;
    let body = serde_json::to_vec(&request_body(
        "req_allow",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    ))
    .unwrap();
    let (status, decision) = post(&harness, &body).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(decision["decision_type"], json!("ALLOW"));
    assert_eq!(decision["reason_code"], json!("OK"));
    assert_eq!(decision["approved_call"]["tool_name"], json!("email.send"));
    assert_eq!(decision["approved_call"]["tool_args"]["to"], json!("bob@example.com"));
}

/// Tests an unlisted tool denies with TOOL_NOT_ALLOWED.
#[tokio::test]
async fn test_tool_not_allowed() {
    let harness = boot().await;
    let body = serde_json::to_vec(&request_body(
        "req_tool_not_allowed",
        "db.drop_all",
        json!({"sure": true}),
        json!({}),
    ))
    .unwrap();
    let (status, decision) = post(&harness, &body).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(decision["decision_type"], json!("DENY"));
    assert_eq!(decision["reason_code"], json!("TOOL_NOT_ALLOWED"));
    assert!(decision.get("approved_call").is_none());
}

/// Tests the approval control denies when absent and allows when presented.
#[tokio::test]
async fn test_control_required_for_storage_put() {
    let harness = boot().await;
    let without = serde_json::to_vec(&request_body(
        "req_control",
        "storage.put",
        json!({"key": "a", "value": "b"}),
        json!({}),
    ))
    .unwrap();
    let (_, denied) = post(&harness, &without).await;
    assert_eq!(denied["decision_type"], json!("DENY"));
    assert_eq!(denied["reason_code"], json!("CONTROL_REQUIRED"));

    let with = serde_json::to_vec(&request_body(
        "req_control_ok",
        "storage.put",
        json!({"key": "a", "value": "b"}),
        json!({"approval_token": "APPROVED"}),
    ))
    .unwrap();
    let (_, allowed) = post(&harness, &with).await;
    assert_eq!(allowed["decision_type"], json!("ALLOW"));
    assert_eq!(allowed["reason_code"], json!("OK"));
}

/// Tests a constraint violation on the recipient domain.
#[tokio::test]
async fn test_constraint_violation_email_domain() {
    let harness = boot().await;
    let body = serde_json::to_vec(&request_body(
        "req_bad_domain",
        "email.send",
        json!({"to": "bob@gmail.com", "subject": "hi"}),
        json!({}),
    ))
    .unwrap();
    let (_, decision) = post(&harness, &body).await;

    assert_eq!(decision["decision_type"], json!("DENY"));
    assert_eq!(decision["reason_code"], json!("CONSTRAINT_VIOLATION"));
}

/// Tests a snapshot hash altered by one digit denies with CTX_HASH_MISMATCH.
#[tokio::test]
async fn test_context_hash_mismatch() {
    let harness = boot().await;
    let mut body = request_body(
        "req_ctx",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    );
    let claim = body.pointer("/context/snapshot_hash").unwrap().as_str().unwrap();
    let mut altered = claim.to_string();
    let last = altered.pop().unwrap();
    altered.push(if last == '0' { '1' } else { '0' });
    *body.pointer_mut("/context/snapshot_hash").unwrap() = json!(altered);

    let (_, decision) = post(&harness, &serde_json::to_vec(&body).unwrap()).await;
    assert_eq!(decision["decision_type"], json!("DENY"));
    assert_eq!(decision["reason_code"], json!("CTX_HASH_MISMATCH"));
}

/// Tests resending a request reproduces the provenance id and extends a
/// valid, contiguous audit chain.
#[tokio::test]
async fn test_determinism_and_audit_chain() {
    let harness = boot().await;
    let body = serde_json::to_vec(&request_body(
        "prov_1",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    ))
    .unwrap();
    let (_, first) = post(&harness, &body).await;
    let (_, second) = post(&harness, &body).await;

    assert_eq!(first["provenance_id"], second["provenance_id"]);

    let records = read_records(&harness.audit_path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].seq, 0);
    assert_eq!(records[1].seq, 1);
    verify_chain(&records).unwrap();
    assert_eq!(
        records[0].provenance_id.as_str(),
        first["provenance_id"].as_str().unwrap()
    );
}

// ============================================================================
// SECTION: Transport Contract
// ============================================================================

/// Tests malformed JSON still replies 200 with an audited parse-error deny.
#[tokio::test]
async fn test_parse_error_is_http_200() {
    let harness = boot().await;
    let (status, decision) = post(&harness, b"{not json").await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(decision["decision_type"], json!("DENY"));
    assert_eq!(decision["reason_code"], json!("REQUEST_PARSE_ERROR"));

    let records = read_records(&harness.audit_path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_id.as_str(), "UNKNOWN");
}

/// Tests the response body is canonical JSON (sorted keys, compact form).
#[tokio::test]
async fn test_response_body_is_canonical() {
    let harness = boot().await;
    let body = serde_json::to_vec(&request_body(
        "req_canonical",
        "email.send",
        json!({"to": "bob@example.com", "subject": "hi"}),
        json!({}),
    ))
    .unwrap();
    let client = reqwest::Client::new();
    let response = client
        .post(&harness.url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("content-type").unwrap().to_str().unwrap(),
        "application/json"
    );
    let raw = response.bytes().await.unwrap();
    let value: Value = serde_json::from_slice(&raw).unwrap();
    let canonical = exec_gate_core::canonical_json_bytes(&value).unwrap();
    assert_eq!(raw.as_ref(), canonical.as_slice());
}

/// Tests an oversized body is a transport fault, not a decision.
#[tokio::test]
async fn test_oversized_body_is_transport_fault() {
    let harness = boot().await;
    let oversized = vec![b'x'; 128 * 1024];
    let client = reqwest::Client::new();
    let response = client
        .post(&harness.url)
        .header("content-type", "application/json")
        .body(oversized)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);

    // No decision was made, so nothing was audited.
    assert!(read_records(&harness.audit_path).unwrap().is_empty());
}
