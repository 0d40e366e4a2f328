//! AgenticVault: local fact and credential store for agents.
//!
//! Provides schema-validated facts with timestamps and staleness
//! tracking, per-field encrypted connection bundles bound to a
//! did:key workspace identity, and discovery of passphrase-protected
//! local signing keys. Everything lives as JSON under one workspace
//! root and is written atomically.

pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod storage;
pub mod store;
pub mod time;
pub mod vault;

// Re-export primary types
pub use config::VaultConfig;
pub use error::{Result, StoreError};
pub use identity::{IdentityKey, IdentityManager, LocalKeyring, RecordedKey};
pub use store::{
    ConnectionStore, CredentialPrompter, Fact, FactStore, FieldError, PromptSession,
    SchemaRegistry, StoreLayout, ValidationReport, WriteOutcome,
};
pub use vault::Vault;
