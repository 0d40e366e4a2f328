//! Integration test: credential workflow across identities.
//!
//! Tests the complete lifecycle:
//! 1. First write creates the workspace identity key
//! 2. Values are encrypted per field and tagged with the key
//! 3. Prompting fills in a missing field once per session
//! 4. A different active key fails loudly and touches nothing
//! 5. Legacy whole-bundle documents are migrated on read

use std::collections::BTreeMap;

use agentic_vault::crypto::did::is_did_key;
use agentic_vault::store::{SealedValue, StaticPrompter};
use agentic_vault::{PromptSession, StoreError, Vault, VaultConfig};
use serde_json::{json, Value};

fn vault(root: &std::path::Path, identity: &str) -> Vault {
    let mut config = VaultConfig::with_root(root);
    config.identity = identity.to_string();
    Vault::open(config).expect("vault should open")
}

fn raw_bundle(root: &std::path::Path, bundle: &str) -> Value {
    let bytes = std::fs::read(root.join("connections").join(format!("{bundle}.json"))).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn credential_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let laptop = vault(dir.path(), "laptop");

    // ── Step 1: First write creates the identity key ────────────────────
    assert!(laptop.identities().active().unwrap().is_none());
    let mut values = BTreeMap::new();
    values.insert("user".to_string(), "octocat".to_string());
    laptop.connections().set("github", &values).unwrap();
    let key = laptop
        .identities()
        .active()
        .unwrap()
        .expect("identity key should be created on first write");
    assert!(is_did_key(key.did()));

    // ── Step 2: Per-field envelope ──────────────────────────────────────
    let doc = raw_bundle(dir.path(), "github");
    let sealed = SealedValue::parse(doc["config"]["user"].as_str().unwrap()).unwrap();
    assert_eq!(sealed.algorithm, "aes-256-gcm");
    assert_eq!(sealed.key_name, "laptop");
    assert_eq!(sealed.did, key.did());

    // ── Step 3: Prompt for a missing field ──────────────────────────────
    let mut prompter = StaticPrompter::new().with_answer("github", "token", "ghp_abc");
    let mut session = PromptSession::new();
    let token = laptop
        .connections()
        .get_value("github", "token", &mut prompter, &mut session)
        .unwrap();
    assert_eq!(token, "ghp_abc");
    let stored = laptop.connections().get("github").unwrap().unwrap();
    assert_eq!(stored["user"], "octocat");
    assert_eq!(stored["token"], "ghp_abc");

    let again = vault(dir.path(), "laptop")
        .connections()
        .get_value("github", "token", &mut prompter, &mut session)
        .unwrap();
    assert_eq!(again, "ghp_abc");
    assert_eq!(prompter.asked.len(), 1);

    // ── Step 4: Another identity cannot read it ─────────────────────────
    let path = dir.path().join("connections/github.json");
    let before = std::fs::read(&path).unwrap();
    let ci = vault(dir.path(), "ci");
    ci.identities().ensure_active().unwrap();
    let err = ci.connections().get("github").unwrap_err();
    assert!(err.is_fatal());
    let message = err.to_string();
    assert!(message.contains(&key.tag()), "{message}");
    assert!(message.contains("ci-did:key:"), "{message}");
    assert_eq!(std::fs::read(&path).unwrap(), before);

    // ── Step 5: The original identity still reads it ────────────────────
    assert_eq!(
        laptop.connections().get("github").unwrap().unwrap(),
        stored
    );
}

#[test]
fn legacy_whole_bundle_is_rewritten_per_field() {
    let dir = tempfile::tempdir().unwrap();
    let v = vault(dir.path(), "default");
    let key = v.identities().ensure_active().unwrap();

    let sealed = SealedValue::seal(&key, r#"{"host":"db.internal","password":"hunter2"}"#).unwrap();
    let path = dir.path().join("connections/postgres.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, json!({ "config": sealed.to_string() }).to_string()).unwrap();

    let values = v.connections().get("postgres").unwrap().unwrap();
    assert_eq!(values["host"], "db.internal");
    assert_eq!(values["password"], "hunter2");

    let doc = raw_bundle(dir.path(), "postgres");
    let config = doc["config"].as_object().expect("per-field object");
    assert_eq!(config.len(), 2);
    for value in config.values() {
        let tagged = value.as_str().unwrap();
        let parsed = SealedValue::parse(tagged).expect("tagged ciphertext");
        assert_eq!(parsed.key_tag(), key.tag());
    }
}

#[test]
fn missing_identity_key_is_never_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let v = vault(dir.path(), "default");
    let mut values = BTreeMap::new();
    values.insert("token".to_string(), "t".to_string());
    v.connections().set("github", &values).unwrap();
    std::fs::remove_file(dir.path().join("keys/default.json")).unwrap();

    match v.connections().get("github") {
        Err(StoreError::KeyFileMissing(path)) => assert!(path.ends_with("keys/default.json")),
        other => panic!("expected KeyFileMissing, got {other:?}"),
    }
    assert!(!dir.path().join("keys/default.json").exists());
}
