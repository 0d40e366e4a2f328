//! The fact and credential store.
//!
//! # Modules
//!
//! - [`paths`]: deterministic placement of every file the vault owns.
//! - [`schema`]: JSON Schema registration, validation, wrap/unwrap.
//! - [`facts`]: schema-tagged facts with timestamps and staleness.
//! - [`bundle`]: on-disk connection formats and the ciphertext tag grammar.
//! - [`connections`]: per-field encrypted credential bundles.
//! - [`prompt`]: the seam for asking a human for a missing secret.

pub mod bundle;
pub mod connections;
pub mod facts;
pub mod paths;
pub mod prompt;
pub mod schema;

pub use bundle::{BundleFormat, SealedValue};
pub use connections::{ConnectionStore, Credentials};
pub use facts::{Fact, FactStore};
pub use paths::StoreLayout;
pub use prompt::{CredentialPrompter, PromptSession, StaticPrompter};
pub use schema::{FieldError, RegisteredSchema, SchemaRegistry, ValidationReport};

/// Result of an idempotent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New bytes were written to disk.
    Written,
    /// The file already held identical bytes and was not touched.
    Unchanged,
}
