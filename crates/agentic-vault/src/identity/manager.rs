//! Identity manager: owns the named identity keys of one workspace.

use crate::error::{Result, StoreError};
use crate::identity::key_file::IdentityKey;
use crate::storage::atomic;
use crate::store::paths::StoreLayout;

/// Loads, creates, and lists identity keys under `keys/`.
///
/// One key is *active*: it encrypts every connection written by this
/// process and is the only key used to decrypt.
#[derive(Debug, Clone)]
pub struct IdentityManager {
    layout: StoreLayout,
    active: String,
}

impl IdentityManager {
    pub fn new(layout: StoreLayout, active: impl Into<String>) -> Self {
        Self {
            layout,
            active: active.into(),
        }
    }

    /// Name of the active identity key.
    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// Load the identity key `name`, if it exists.
    pub fn load(&self, name: &str) -> Result<Option<IdentityKey>> {
        let path = self.layout.identity_key_path(name)?;
        IdentityKey::load(name, &path)
    }

    /// Create and persist a new identity key.
    ///
    /// # Errors
    ///
    /// Refuses to replace an existing key file with `StoreError::InvalidKey`;
    /// key material is never overwritten.
    pub fn create(&self, name: &str) -> Result<IdentityKey> {
        let path = self.layout.identity_key_path(name)?;
        if path.exists() {
            return Err(StoreError::InvalidKey(format!(
                "identity key '{name}' already exists at {}",
                path.display()
            )));
        }
        let key = IdentityKey::generate(name);
        key.save(&path)?;
        log::info!("created identity key '{name}' ({})", key.did());
        Ok(key)
    }

    /// Load `name`, creating it on first use.
    pub fn load_or_create(&self, name: &str) -> Result<IdentityKey> {
        match self.load(name)? {
            Some(key) => Ok(key),
            None => self.create(name),
        }
    }

    /// The active key, if it exists. Never creates one.
    pub fn active(&self) -> Result<Option<IdentityKey>> {
        self.load(&self.active)
    }

    /// The active key, created on first use.
    pub fn ensure_active(&self) -> Result<IdentityKey> {
        self.load_or_create(&self.active)
    }

    /// Names of all identity keys on disk, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        atomic::list_json_stems(self.layout.keys_dir())
    }
}
