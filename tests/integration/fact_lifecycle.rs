//! Integration test: fact lifecycle through a vault.
//!
//! Tests the complete lifecycle:
//! 1. Register a schema
//! 2. Write a fact and read it back with timestamps
//! 3. Re-write identical data and observe no file change
//! 4. Change the data and observe `updatedAt` advance
//! 5. Staleness against raw source files
//! 6. Validation feedback for invalid data

use std::path::PathBuf;
use std::time::Duration;

use agentic_vault::store::facts::{CREATED_AT, UPDATED_AT};
use agentic_vault::{Vault, VaultConfig, WriteOutcome};
use serde_json::{json, Map, Value};

const NO_SOURCES: &[PathBuf] = &[];

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn open(root: &std::path::Path) -> Vault {
    Vault::open(VaultConfig::with_root(root)).expect("vault should open")
}

#[test]
fn deployment_ready_ready_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = open(dir.path());

    // ── Step 1: Register a schema declaring both timestamps ─────────────
    vault
        .register_schema(
            "deployments",
            json!({
                "type": "object",
                "properties": {
                    "status": { "enum": ["READY", "ERROR", "BUILDING"] },
                    "createdAt": { "type": "string" },
                    "updatedAt": { "type": "string" }
                },
                "required": ["status"]
            }),
            1,
        )
        .unwrap();
    let facts = vault.facts();
    let path = facts.path("deployments", "site-a").unwrap();

    // ── Step 2: First write ─────────────────────────────────────────────
    let ready = object(json!({ "status": "READY" }));
    assert_eq!(
        facts.set("deployments", "site-a", &ready).unwrap(),
        WriteOutcome::Written
    );
    let first = facts
        .get("deployments", "site-a", NO_SOURCES)
        .unwrap()
        .expect("fact should exist");
    assert_eq!(first.data["status"], "READY");
    let created = first.data[CREATED_AT].clone();
    assert_eq!(created, first.data[UPDATED_AT]);
    assert!(first.validation.is_none());

    let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["$id"], "deployments.v1");

    // ── Step 3: Identical write leaves the file alone ───────────────────
    let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(
        facts.set("deployments", "site-a", &ready).unwrap(),
        WriteOutcome::Unchanged
    );
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);

    // ── Step 4: Changed payload advances updatedAt only ─────────────────
    std::thread::sleep(Duration::from_millis(20));
    let error = object(json!({ "status": "ERROR" }));
    facts.set("deployments", "site-a", &error).unwrap();
    let third = facts
        .get("deployments", "site-a", NO_SOURCES)
        .unwrap()
        .unwrap();
    assert_eq!(third.data["status"], "ERROR");
    assert_eq!(third.data[CREATED_AT], created);
    assert_ne!(third.data[UPDATED_AT], created);
}

#[test]
fn undeclared_timestamps_are_not_added() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = open(dir.path());
    vault
        .register_schema(
            "deployments",
            json!({
                "type": "object",
                "properties": {
                    "status": { "type": "string" },
                    "createdAt": { "type": "string" }
                }
            }),
            1,
        )
        .unwrap();
    let facts = vault.facts();
    facts
        .set("deployments", "site-a", &object(json!({ "status": "READY" })))
        .unwrap();
    let fact = facts
        .get("deployments", "site-a", NO_SOURCES)
        .unwrap()
        .unwrap();
    assert!(fact.data.contains_key(CREATED_AT));
    assert!(!fact.data.contains_key(UPDATED_AT));
}

#[test]
fn staleness_follows_raw_sources() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let facts = vault.facts();
    let source = dir.path().join("terraform.tfstate");
    std::fs::write(&source, b"{}").unwrap();

    std::thread::sleep(Duration::from_millis(20));
    facts
        .set("infra/state", "prod", &object(json!({ "resources": 3 })))
        .unwrap();
    let sources = [source.clone()];
    assert!(!facts.is_stale("infra/state", "prod", &sources).unwrap());

    std::thread::sleep(Duration::from_millis(20));
    std::fs::write(&source, b"{\"changed\": true}").unwrap();
    assert!(facts.is_stale("infra/state", "prod", &sources).unwrap());

    let missing = [dir.path().join("gone.json")];
    assert!(facts.is_stale("infra/state", "prod", &missing).unwrap());
    assert!(!facts.is_stale("infra/state", "prod", NO_SOURCES).unwrap());
    assert!(facts.is_stale("infra/state", "absent", NO_SOURCES).unwrap());
}

#[test]
fn invalid_fact_is_stored_with_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let mut vault = open(dir.path());
    vault
        .register_schema(
            "dns/records",
            json!({
                "type": "object",
                "properties": { "ttl": { "type": "integer", "minimum": 60 } },
                "required": ["ttl"]
            }),
            2,
        )
        .unwrap();

    // Reopen so the schema comes back from disk.
    let vault = open(dir.path());
    let facts = vault.facts();
    facts
        .set("dns/records", "example.com", &object(json!({ "ttl": 5 })))
        .unwrap();
    let fact = facts
        .get("dns/records", "example.com", NO_SOURCES)
        .unwrap()
        .unwrap();
    assert_eq!(fact.data["ttl"], 5);
    let report = fact.validation.expect("validation feedback should be stored");
    assert!(!report.is_valid());
    assert_eq!(report.errors[0].path, "/ttl");

    assert!(dir.path().join("schemas/dns~records.json").exists());
    assert!(dir
        .path()
        .join("facts/dns~records/example.com.json")
        .exists());
    assert_eq!(facts.list("dns/records").unwrap(), vec!["example.com"]);
}

#[test]
fn unregistered_type_is_stored_without_validation() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open(dir.path());
    let facts = vault.facts();
    facts
        .set("notes", "today", &object(json!({ "text": "hi" })))
        .unwrap();
    let fact = facts.get("notes", "today", NO_SOURCES).unwrap().unwrap();
    assert_eq!(fact.data, object(json!({ "text": "hi" })));
    assert!(fact.validation.is_none());
    assert!(facts.delete("notes", "today").unwrap());
    assert!(facts.get("notes", "today", NO_SOURCES).unwrap().is_none());
}
