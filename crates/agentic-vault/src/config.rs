//! Vault configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! The conventional root is `~/.agentic/vault/`:
//!
//! ```text
//! ~/.agentic/vault/
//! ├── schemas/{entity~type}.json
//! ├── facts/{entity~type}/{instance}.json
//! ├── connections/{bundle}.json
//! └── keys/{identity}.json
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Environment variable overriding the workspace root.
pub const ROOT_ENV: &str = "AGENTIC_VAULT_ROOT";
/// Environment variable overriding the active identity key name.
pub const IDENTITY_ENV: &str = "AGENTIC_VAULT_IDENTITY";
/// Environment variable overriding the local signing-key directory.
pub const KEYRING_ENV: &str = "AGENTIC_VAULT_KEYRING";

/// Configuration for a vault rooted at one workspace directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultConfig {
    /// Workspace root; every namespace lives beneath it.
    pub root: PathBuf,
    /// Directory (relative to root) holding schema files.
    pub schemas_dir: String,
    /// Directory (relative to root) holding fact files.
    pub facts_dir: String,
    /// Directory (relative to root) holding connection bundles.
    pub connections_dir: String,
    /// Directory (relative to root) holding identity keys.
    pub keys_dir: String,
    /// Name of the identity key that encrypts connections.
    pub identity: String,
    /// Directory with local passphrase-protected signing keys.
    pub keyring_dir: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            schemas_dir: "schemas".to_string(),
            facts_dir: "facts".to_string(),
            connections_dir: "connections".to_string(),
            keys_dir: "keys".to_string(),
            identity: "default".to_string(),
            keyring_dir: None,
        }
    }
}

impl VaultConfig {
    /// Configuration rooted at `root` with default namespaces.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `AGENTIC_VAULT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(root) = std::env::var_os(ROOT_ENV) {
            config.root = PathBuf::from(root);
        }
        if let Ok(identity) = std::env::var(IDENTITY_ENV) {
            if !identity.trim().is_empty() {
                config.identity = identity.trim().to_string();
            }
        }
        if let Some(dir) = std::env::var_os(KEYRING_ENV) {
            config.keyring_dir = Some(PathBuf::from(dir));
        }
        config
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::InvalidFileFormat(format!("config {}: {e}", path.display()))
        })
    }

    pub fn schemas_root(&self) -> PathBuf {
        self.root.join(&self.schemas_dir)
    }

    pub fn facts_root(&self) -> PathBuf {
        self.root.join(&self.facts_dir)
    }

    pub fn connections_root(&self) -> PathBuf {
        self.root.join(&self.connections_dir)
    }

    pub fn keys_root(&self) -> PathBuf {
        self.root.join(&self.keys_dir)
    }

    /// Signing-key directory, `<root>/keyring` unless configured.
    pub fn keyring_root(&self) -> PathBuf {
        self.keyring_dir
            .clone()
            .unwrap_or_else(|| self.root.join("keyring"))
    }
}

fn default_root() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".agentic").join("vault")
}
