//! One workspace's stores, wired from a [`VaultConfig`].

use std::sync::Arc;

use serde_json::Value;

use crate::config::VaultConfig;
use crate::error::Result;
use crate::identity::{IdentityManager, LocalKeyring};
use crate::store::{ConnectionStore, FactStore, SchemaRegistry, StoreLayout, WriteOutcome};

/// Schemas, facts, connections, and keys under a single root.
pub struct Vault {
    config: VaultConfig,
    layout: StoreLayout,
    registry: Arc<SchemaRegistry>,
    connections: ConnectionStore,
}

impl Vault {
    /// Open the vault described by `config`, loading registered schemas.
    ///
    /// Nothing is created on disk until something is written.
    pub fn open(config: VaultConfig) -> Result<Self> {
        let layout = StoreLayout::new(&config);
        let mut registry = SchemaRegistry::new(layout.clone());
        let loaded = registry.load_dir()?;
        log::debug!(
            "opened vault at {} ({loaded} schema(s))",
            config.root.display()
        );

        let identities = IdentityManager::new(layout.clone(), config.identity.clone());
        Ok(Self {
            connections: ConnectionStore::new(layout.clone(), identities),
            registry: Arc::new(registry),
            layout,
            config,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Register a schema; later [`facts`](Self::facts) handles see it.
    pub fn register_schema(
        &mut self,
        entity_type: &str,
        schema: Value,
        version: u32,
    ) -> Result<WriteOutcome> {
        Arc::make_mut(&mut self.registry).register(entity_type, schema, version)
    }

    /// A fact store over the current schema set.
    pub fn facts(&self) -> FactStore {
        FactStore::new(self.layout.clone(), Arc::clone(&self.registry))
    }

    pub fn connections(&self) -> &ConnectionStore {
        &self.connections
    }

    pub fn identities(&self) -> &IdentityManager {
        self.connections.identities()
    }

    pub fn keyring(&self) -> LocalKeyring {
        LocalKeyring::new(self.config.keyring_root())
    }
}
