//! Workspace Basics: register a schema, store facts, keep a credential.
//!
//! Run with:
//!   cargo run --example workspace_basics -p agentic-vault

use std::collections::BTreeMap;
use std::path::PathBuf;

use agentic_vault::{Vault, VaultConfig};
use serde_json::json;

fn main() {
    let dir = tempfile::tempdir().expect("scratch directory");
    let mut vault = Vault::open(VaultConfig::with_root(dir.path())).expect("vault should open");

    // ── 1. Register a schema ────────────────────────────────────────────────
    //
    // Declaring `createdAt` and `updatedAt` asks the store to maintain them.
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
        .expect("schema should register");

    // ── 2. Write and read a fact ────────────────────────────────────────────
    let facts = vault.facts();
    let data = json!({ "status": "READY" });
    let data = data.as_object().expect("object literal");
    let outcome = facts
        .set("deployments", "site-a", data)
        .expect("fact should be written");
    println!("First write:  {outcome:?}");
    let outcome = facts
        .set("deployments", "site-a", data)
        .expect("fact should be written");
    println!("Second write: {outcome:?}");

    let fact = facts
        .get("deployments", "site-a", &[] as &[PathBuf])
        .expect("fact should be readable")
        .expect("fact should exist");
    println!("Fact: {}", serde_json::Value::Object(fact.data));
    println!();

    // ── 3. Store a credential ───────────────────────────────────────────────
    //
    // The first write creates the workspace identity key. Each field is
    // sealed on its own and tagged with the key's name and DID.
    let mut values = BTreeMap::new();
    values.insert("token".to_string(), "ghp_example".to_string());
    vault
        .connections()
        .set("github", &values)
        .expect("connection should be written");

    let key = vault
        .identities()
        .active()
        .expect("key should load")
        .expect("key should exist");
    println!("Identity: {}", key.tag());

    let raw = std::fs::read_to_string(dir.path().join("connections/github.json"))
        .expect("bundle on disk");
    println!("On disk:  {raw}");
    let stored = vault
        .connections()
        .get("github")
        .expect("bundle should decrypt")
        .expect("bundle should exist");
    println!("Token:    {}", stored["token"]);
}
