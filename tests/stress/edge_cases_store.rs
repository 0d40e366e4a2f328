//! Stress tests: edge cases for names, documents, and key files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use agentic_vault::crypto::{decrypt_value, encrypt_value, generate_keypair};
use agentic_vault::store::BundleFormat;
use agentic_vault::{StoreError, Vault, VaultConfig};
use serde_json::{json, Map, Value};

const NO_SOURCES: &[PathBuf] = &[];

fn open(root: &std::path::Path) -> Vault {
    Vault::open(VaultConfig::with_root(root)).unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

// ── Names ───────────────────────────────────────────────────────────────

#[test]
fn rejects_escaping_names_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let facts = vault.facts();
    let data = object(json!({ "x": 1 }));

    for (entity_type, instance) in [
        ("../outside", "a"),
        ("deployments", ".."),
        ("deployments", "a/b"),
        ("a~b", "c"),
        ("", "c"),
        ("dns/", "c"),
    ] {
        let err = facts.set(entity_type, instance, &data).unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidName(_)),
            "{entity_type}/{instance}: {err:?}"
        );
    }

    let mut values = BTreeMap::new();
    values.insert("k".to_string(), "v".to_string());
    assert!(vault.connections().set("../etc", &values).is_err());
    assert!(vault.identities().create("../key").is_err());
    assert!(!dir.path().parent().unwrap().join("etc.json").exists());
}

#[test]
fn unicode_names_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let facts = vault.facts();
    facts
        .set("日本/サイト", "東京", &object(json!({ "名前": "値 🚀" })))
        .unwrap();
    let fact = facts.get("日本/サイト", "東京", NO_SOURCES).unwrap().unwrap();
    assert_eq!(fact.data["名前"], "値 🚀");

    let mut values = BTreeMap::new();
    values.insert("pässwörd".to_string(), "🔑 secret ключ".to_string());
    vault.connections().set("ünïcode", &values).unwrap();
    assert_eq!(vault.connections().get("ünïcode").unwrap().unwrap(), values);
}

// ── Documents ───────────────────────────────────────────────────────────

#[test]
fn corrupt_fact_file_is_an_error_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let facts = vault.facts();
    let path = facts.path("deployments", "site-a").unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(
        facts.get("deployments", "site-a", NO_SOURCES),
        Err(StoreError::InvalidFileFormat(_))
    ));
    // A write replaces the unreadable file.
    facts
        .set("deployments", "site-a", &object(json!({ "status": "READY" })))
        .unwrap();
    assert!(facts.get("deployments", "site-a", NO_SOURCES).unwrap().is_some());
}

#[test]
fn corrupt_bundle_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let path = dir.path().join("connections/broken.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    for body in ["[]", "{\"config\": 7}", "garbage"] {
        std::fs::write(&path, body).unwrap();
        let err = vault.connections().get("broken").unwrap_err();
        assert!(matches!(err, StoreError::InvalidFileFormat(_)), "{body}: {err:?}");
        assert_eq!(std::fs::read(&path).unwrap(), body.as_bytes());
    }
}

#[test]
fn empty_bundle_needs_no_key() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let path = dir.path().join("connections/empty.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{\"config\": {}}").unwrap();

    assert!(vault.connections().get("empty").unwrap().unwrap().is_empty());
    assert!(vault.identities().active().unwrap().is_none());
    assert!(!BundleFormat::decode("empty", &json!({"config": {}}))
        .unwrap()
        .needs_migration());
}

#[test]
fn many_fields_many_bundles() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let values: BTreeMap<String, String> = (0..100)
        .map(|i| (format!("field_{i:03}"), format!("value-{i}")))
        .collect();
    for b in 0..20 {
        vault
            .connections()
            .set(&format!("bundle-{b:02}"), &values)
            .unwrap();
    }
    assert_eq!(vault.connections().list().unwrap().len(), 20);
    assert_eq!(vault.connections().get("bundle-07").unwrap().unwrap(), values);
}

// ── Keys ────────────────────────────────────────────────────────────────

#[test]
fn values_do_not_open_under_another_key() {
    let a = generate_keypair();
    let b = generate_keypair();
    for plaintext in ["", "x", "a much longer secret value with spaces", "🔐"] {
        let sealed = encrypt_value(plaintext, &a.private_key).unwrap();
        assert_eq!(decrypt_value(&sealed, &a.private_key).unwrap(), plaintext);
        assert!(matches!(
            decrypt_value(&sealed, &b.private_key),
            Err(StoreError::DecryptionFailed(_))
        ));
    }
}

#[test]
fn encryption_is_randomized() {
    let key = generate_keypair();
    let first = encrypt_value("same", &key.private_key).unwrap();
    let second = encrypt_value("same", &key.private_key).unwrap();
    assert_ne!(first, second);
}

#[test]
fn truncated_ciphertext_fails_cleanly() {
    let key = generate_keypair();
    let sealed = encrypt_value("secret", &key.private_key).unwrap();
    assert!(decrypt_value(&sealed[..8], &key.private_key).is_err());
    assert!(decrypt_value("", &key.private_key).is_err());
    assert!(decrypt_value("%%%", &key.private_key).is_err());
}

#[test]
fn damaged_stored_values_are_fatal_and_never_rewritten() {
    let damage: [(&str, fn(&str) -> String); 4] = [
        ("truncated body", |t| t[..t.len() - 3].to_string()),
        ("flipped body char", |t| {
            let (head, body) = t.rsplit_once(':').unwrap();
            let mut chars: Vec<char> = body.chars().collect();
            chars[5] = if chars[5] == 'A' { 'B' } else { 'A' };
            format!("{head}:{}", chars.into_iter().collect::<String>())
        }),
        ("empty body", |t| format!("{}:", t.rsplit_once(':').unwrap().0)),
        ("cut did", |t| t.replacen("did:key:z6Mk", "did:key:z6", 1)),
    ];

    for (label, edit) in damage {
        let dir = tempfile::tempdir().unwrap();
        let vault = open(dir.path());
        let mut values = BTreeMap::new();
        values.insert("token".to_string(), "ghp_real".to_string());
        values.insert("user".to_string(), "octocat".to_string());
        vault.connections().set("github", &values).unwrap();

        let path = dir.path().join("connections/github.json");
        let mut doc: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let tagged = doc["config"]["token"].as_str().unwrap().to_string();
        doc["config"]["token"] = Value::String(edit(&tagged));
        let before = serde_json::to_vec_pretty(&doc).unwrap();
        std::fs::write(&path, &before).unwrap();

        for _ in 0..2 {
            let err = vault.connections().get("github").unwrap_err();
            assert!(err.is_fatal(), "{label}: got {err:?}");
        }
        assert_eq!(std::fs::read(&path).unwrap(), before, "{label}: file changed");
    }
}

#[test]
fn tampered_identity_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    vault.identities().ensure_active().unwrap();
    let path = dir.path().join("keys/default.json");
    let mut doc: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    doc["privateKey"] = Value::String(generate_keypair().private_key);
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

    let err = vault.identities().ensure_active().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, StoreError::IdentityMismatch { .. }));
}
