//! Identity key files: the workspace key that encrypts connections.
//!
//! File format (JSON, mode `0600`):
//! ```json
//! {
//!     "did": "did:key:z6Mk...",
//!     "privateKey": "<base64-32-byte-seed>",
//!     "createdAt": "2026-01-01T00:00:00.000000Z"
//! }
//! ```
//!
//! The DID is re-derived from the private key on every load; a file whose
//! stored DID disagrees is rejected as fatal rather than repaired.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::{self, did_for};
use crate::error::{Result, StoreError};
use crate::storage::atomic::{self, OWNER_READ_WRITE};
use crate::time;

/// On-disk structure.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityKeyFile {
    did: String,
    private_key: String,
    created_at: String,
}

/// A named workspace identity: Ed25519 seed plus its DID.
///
/// The private key is zeroized on drop and never printed by `Debug`.
pub struct IdentityKey {
    name: String,
    did: String,
    private_key: String,
    created_at: String,
}

impl IdentityKey {
    /// Generate a new identity key named `name`.
    pub fn generate(name: &str) -> Self {
        let generated = crypto::generate_keypair();
        Self {
            name: name.to_string(),
            did: generated.did,
            private_key: generated.private_key,
            created_at: time::now_rfc3339(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// `<name>-<did>`, the identity portion of every ciphertext tag.
    pub fn tag(&self) -> String {
        format!("{}-{}", self.name, self.did)
    }

    /// Encrypt a secret under this identity.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        crypto::encrypt_value(plaintext, &self.private_key)
    }

    /// Decrypt a secret sealed under this identity.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        crypto::decrypt_value(ciphertext, &self.private_key)
    }

    /// Persist to `path` atomically with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = IdentityKeyFile {
            did: self.did.clone(),
            private_key: self.private_key.clone(),
            created_at: self.created_at.clone(),
        };
        let mut json = serde_json::to_vec_pretty(&file)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        drop(file);
        atomic::write_atomic(path, &json, Some(OWNER_READ_WRITE))?;
        json.zeroize();
        Ok(())
    }

    /// Load the identity key `name` from `path`. Missing file → `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CorruptKeyFile` if the file cannot be parsed or
    /// holds an invalid key, `StoreError::IdentityMismatch` if its DID does
    /// not derive from its private key, or `StoreError::Io`.
    pub fn load(name: &str, path: &Path) -> Result<Option<Self>> {
        let Some(mut bytes) = atomic::read_optional(path)? else {
            return Ok(None);
        };
        let parsed: std::result::Result<IdentityKeyFile, _> = serde_json::from_slice(&bytes);
        bytes.zeroize();
        let file = parsed.map_err(|e| StoreError::CorruptKeyFile {
            path: path.to_path_buf(),
            reason: format!("unreadable identity key: {e}"),
        })?;

        let derived = did_for(&file.private_key).map_err(|e| StoreError::CorruptKeyFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if derived != file.did {
            return Err(StoreError::IdentityMismatch {
                name: name.to_string(),
                stored: file.did.clone(),
                derived,
            });
        }

        Ok(Some(Self {
            name: name.to_string(),
            did: file.did.clone(),
            private_key: file.private_key.clone(),
            created_at: file.created_at.clone(),
        }))
    }
}

impl Drop for IdentityKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKey")
            .field("name", &self.name)
            .field("did", &self.did)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Drop for IdentityKeyFile {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}
