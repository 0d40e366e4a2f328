//! Deterministic file placement for schemas, facts, bundles, and keys.
//!
//! Resolution is a pure function of the configured root and the names
//! involved; nothing here touches the filesystem. Names are validated so
//! that distinct (type, instance) pairs can never resolve to one path.

use std::path::PathBuf;

use crate::config::VaultConfig;
use crate::error::{Result, StoreError};

const EXTENSION: &str = "json";
/// Replacement for `/` when an entity type is flattened into one file name.
const TYPE_DELIMITER: char = '~';

/// Resolved directory layout of one vault.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    schemas: PathBuf,
    facts: PathBuf,
    connections: PathBuf,
    keys: PathBuf,
}

impl StoreLayout {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            schemas: config.schemas_root(),
            facts: config.facts_root(),
            connections: config.connections_root(),
            keys: config.keys_root(),
        }
    }

    /// Path of the fact file for `(entity_type, instance)`.
    ///
    /// `<root>/<facts>/<entity~type>/<instance>.json`
    pub fn resolve(&self, entity_type: &str, instance: &str) -> Result<PathBuf> {
        let dir = self.type_dir(entity_type)?;
        check_file_name("instance", instance)?;
        Ok(dir.join(format!("{instance}.{EXTENSION}")))
    }

    /// Directory holding every instance of `entity_type`.
    pub fn type_dir(&self, entity_type: &str) -> Result<PathBuf> {
        Ok(self.facts.join(flatten_entity_type(entity_type)?))
    }

    /// Path of the schema file for `entity_type`.
    ///
    /// `<root>/<schemas>/<entity~type>.json`
    pub fn schema_path(&self, entity_type: &str) -> Result<PathBuf> {
        Ok(self
            .schemas
            .join(format!("{}.{EXTENSION}", flatten_entity_type(entity_type)?)))
    }

    pub fn schemas_dir(&self) -> &PathBuf {
        &self.schemas
    }

    /// Path of a connection bundle.
    pub fn bundle_path(&self, bundle: &str) -> Result<PathBuf> {
        check_file_name("connection", bundle)?;
        Ok(self.connections.join(format!("{bundle}.{EXTENSION}")))
    }

    pub fn connections_dir(&self) -> &PathBuf {
        &self.connections
    }

    /// Path of a named identity key.
    pub fn identity_key_path(&self, name: &str) -> Result<PathBuf> {
        check_file_name("identity", name)?;
        Ok(self.keys.join(format!("{name}.{EXTENSION}")))
    }

    pub fn keys_dir(&self) -> &PathBuf {
        &self.keys
    }
}

/// Flatten an entity type into a single file-name component.
pub fn flatten_entity_type(entity_type: &str) -> Result<String> {
    check_entity_type(entity_type)?;
    Ok(entity_type.replace('/', &TYPE_DELIMITER.to_string()))
}

/// Inverse of [`flatten_entity_type`].
pub fn unflatten_entity_type(flat: &str) -> String {
    flat.replace(TYPE_DELIMITER, "/")
}

fn check_entity_type(entity_type: &str) -> Result<()> {
    if entity_type.contains(TYPE_DELIMITER) || entity_type.contains('\\') {
        return Err(StoreError::InvalidName(format!(
            "entity type '{entity_type}' may not contain '{TYPE_DELIMITER}' or '\\'"
        )));
    }
    for segment in entity_type.split('/') {
        check_segment("entity type", entity_type, segment)?;
    }
    Ok(())
}

fn check_file_name(kind: &str, name: &str) -> Result<()> {
    if name.contains('/') || name.contains('\\') {
        return Err(StoreError::InvalidName(format!(
            "{kind} name '{name}' may not contain path separators"
        )));
    }
    check_segment(kind, name, name)
}

fn check_segment(kind: &str, whole: &str, segment: &str) -> Result<()> {
    if segment.is_empty() || segment.starts_with('.') || segment.contains('\0') {
        return Err(StoreError::InvalidName(format!(
            "{kind} '{whole}' has an empty or hidden path segment"
        )));
    }
    Ok(())
}
