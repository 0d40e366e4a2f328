//! Integration tests for the CLI binary.
//!
//! Runs `avault` against scratch workspaces. Registered as a [[test]] in
//! the agentic-vault-cli crate so that CARGO_BIN_EXE_avault is available.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Get a Command pointing to the `avault` binary.
fn avault_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_avault"))
}

fn avault(root: &Path, args: &[&str]) -> Output {
    avault_binary()
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("AGENTIC_VAULT_IDENTITY")
        .env_remove("AGENTIC_VAULT_KEYRING")
        .output()
        .expect("failed to execute avault")
}

fn avault_with_stdin(root: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = avault_binary()
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("AGENTIC_VAULT_IDENTITY")
        .env_remove("AGENTIC_VAULT_KEYRING")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn avault");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_ok(output: &Output) {
    assert!(
        output.status.success(),
        "avault failed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_responds_to_help() {
    let output = avault_binary()
        .arg("--help")
        .output()
        .expect("failed to execute avault --help");
    assert_ok(&output);
    let out = stdout(&output);
    assert!(
        out.contains("avault") || out.contains("AgenticVault") || out.contains("Usage"),
        "avault --help output should contain usage information, got: {out}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = avault_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute avault");
    assert!(!output.status.success());
}

#[test]
fn cli_fact_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("deployments.schema.json");
    std::fs::write(
        &schema,
        r#"{"type":"object","properties":{"status":{"type":"string"},"createdAt":{"type":"string"}}}"#,
    )
    .unwrap();
    let root = dir.path().join("vault");

    assert_ok(&avault(
        &root,
        &["schema", "register", "deployments", schema.to_str().unwrap()],
    ));
    let set = avault(&root, &["fact", "set", "deployments", "site-a", r#"{"status":"READY"}"#]);
    assert_ok(&set);
    assert_eq!(stdout(&set).trim(), "written");
    let again = avault(&root, &["fact", "set", "deployments", "site-a", r#"{"status":"READY"}"#]);
    assert_eq!(stdout(&again).trim(), "unchanged");

    let get = avault(&root, &["fact", "get", "deployments", "site-a"]);
    assert_ok(&get);
    let doc: serde_json::Value = serde_json::from_str(&stdout(&get)).unwrap();
    assert_eq!(doc["data"]["status"], "READY");
    assert!(doc["data"]["createdAt"].is_string());
    assert_eq!(doc["stale"], false);

    let list = avault(&root, &["fact", "list", "deployments"]);
    assert_eq!(stdout(&list).trim(), "site-a");
}

#[test]
fn cli_missing_fact_and_connection_print_null() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("vault");

    let fact = avault(&root, &["fact", "get", "deployments", "nowhere"]);
    assert_ok(&fact);
    assert_eq!(stdout(&fact).trim(), "null");

    let connection = avault(&root, &["connection", "get", "github"]);
    assert_ok(&connection);
    assert_eq!(stdout(&connection).trim(), "null");

    let delete = avault(&root, &["fact", "delete", "deployments", "nowhere"]);
    assert_ok(&delete);
    assert_eq!(stdout(&delete).trim(), "not found");
}

#[test]
fn cli_schema_validate_fails_on_invalid_data() {
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("s.json");
    std::fs::write(&schema, r#"{"type":"object","required":["name"]}"#).unwrap();
    let root = dir.path().join("vault");
    assert_ok(&avault(&root, &["schema", "register", "people", schema.to_str().unwrap()]));

    assert_ok(&avault(&root, &["schema", "validate", "people", r#"{"name":"a"}"#]));
    let bad = avault(&root, &["schema", "validate", "people", "{}"]);
    assert_eq!(bad.status.code(), Some(1));
}

#[test]
fn cli_connection_roundtrip_and_key_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    assert_ok(&avault(root, &["connection", "set", "github", "token=ghp_x", "user=me"]));
    let get = avault(root, &["connection", "get", "github", "--field", "token"]);
    assert_ok(&get);
    assert_eq!(stdout(&get).trim(), "ghp_x");

    let did = avault(root, &["identity", "did"]);
    assert_ok(&did);
    assert!(stdout(&did).trim().starts_with("did:key:z"));

    assert_ok(&avault(root, &["--identity", "other", "identity", "generate"]));
    let mismatch = avault(root, &["--identity", "other", "connection", "get", "github"]);
    assert_eq!(mismatch.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&mismatch.stderr);
    assert!(stderr.contains("default-did:key:"), "{stderr}");
    assert!(stderr.contains("other-did:key:"), "{stderr}");
}

#[test]
fn cli_connection_prompts_for_missing_field() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let output = avault_with_stdin(
        root,
        &["connection", "get", "gitlab", "--field", "token"],
        "glpat_123\n",
    );
    assert_ok(&output);
    assert_eq!(stdout(&output).trim(), "glpat_123");

    let list = avault(root, &["connection", "list"]);
    assert_eq!(stdout(&list).trim(), "gitlab");
}

#[test]
fn cli_keyring_create_list_verify() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let create = avault_with_stdin(
        root,
        &["keyring", "create", "id_root", "--comment", "ci@host"],
        "hunter22\nhunter22\n",
    );
    assert_ok(&create);
    let out = stdout(&create);
    let fingerprint = out
        .lines()
        .find_map(|l| l.trim().strip_prefix("Fingerprint:"))
        .map(str::trim)
        .expect("fingerprint printed")
        .to_string();
    assert!(fingerprint.starts_with("SHA256:"));

    let list = avault(root, &["keyring", "list"]);
    assert!(stdout(&list).contains(&fingerprint));

    let key = root.join("keyring").join("id_root");
    let key = key.to_str().unwrap();
    assert_ok(&avault(root, &["keyring", "verify", key, "--fingerprint", &fingerprint]));
    let drift = avault(root, &["keyring", "verify", key, "--fingerprint", "SHA256:AAAA"]);
    assert_eq!(drift.status.code(), Some(2));
}
