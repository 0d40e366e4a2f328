//! Fact persistence: schema-tagged snapshots of external state.
//!
//! Each fact is one JSON file at `facts/{entity~type}/{instance}.json`:
//! ```json
//! {
//!     "$schema": "https://json-schema.org/draft/2020-12/schema",
//!     "$id": "deployments.v1",
//!     "status": "READY",
//!     "createdAt": "2026-01-01T00:00:00.000000Z"
//! }
//! ```
//!
//! Writes are content-addressed: a `set` whose serialization matches the
//! file on disk does not touch the file, so its modification time keeps
//! meaning "when this fact last changed". Staleness checks depend on that.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::storage::atomic;
use crate::store::paths::StoreLayout;
use crate::store::schema::{SchemaRegistry, ValidationReport, VALIDATION_KEY};
use crate::store::WriteOutcome;
use crate::time;

/// Timestamp set once on first write, if the schema declares it.
pub const CREATED_AT: &str = "createdAt";
/// Timestamp advanced when the payload changes, if the schema declares it.
pub const UPDATED_AT: &str = "updatedAt";

/// A fact read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    /// Payload fields, without `$schema`/`$id`/`$validation`.
    pub data: Map<String, Value>,
    /// True when any raw source is missing or newer than the fact.
    pub stale: bool,
    /// Validation feedback recorded when the fact was written.
    pub validation: Option<ValidationReport>,
    /// Modification time of the fact file.
    pub modified: Option<SystemTime>,
}

/// Filesystem-backed store for facts.
///
/// Safe for single-process use; concurrent writers in other processes are
/// not coordinated and the last rename wins.
pub struct FactStore {
    layout: StoreLayout,
    registry: Arc<SchemaRegistry>,
}

impl FactStore {
    pub fn new(layout: StoreLayout, registry: Arc<SchemaRegistry>) -> Self {
        Self { layout, registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Path of the fact file for `(entity_type, instance)`.
    pub fn path(&self, entity_type: &str, instance: &str) -> Result<PathBuf> {
        self.layout.resolve(entity_type, instance)
    }

    /// Read a fact. Returns `Ok(None)` when it has never been written.
    ///
    /// `raw_sources` are the files the fact was derived from; see
    /// [`is_stale_against`] for how staleness is decided.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidFileFormat` if the file is not a JSON
    /// object, or `StoreError::Io` for filesystem errors.
    pub fn get<P: AsRef<Path>>(
        &self,
        entity_type: &str,
        instance: &str,
        raw_sources: &[P],
    ) -> Result<Option<Fact>> {
        let path = self.path(entity_type, instance)?;
        let Some(bytes) = atomic::read_optional(&path)? else {
            return Ok(None);
        };
        let document = parse_document(&path, &bytes)?;

        let validation = document
            .get(VALIDATION_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        Ok(Some(Fact {
            data: SchemaRegistry::unwrap(&document),
            stale: is_stale_against(&path, raw_sources),
            validation,
            modified: atomic::modified(&path),
        }))
    }

    /// Whether a stored fact is stale. Absent facts are stale.
    pub fn is_stale<P: AsRef<Path>>(
        &self,
        entity_type: &str,
        instance: &str,
        raw_sources: &[P],
    ) -> Result<bool> {
        let path = self.path(entity_type, instance)?;
        if atomic::modified(&path).is_none() {
            return Ok(true);
        }
        Ok(is_stale_against(&path, raw_sources))
    }

    /// Write a fact.
    ///
    /// Timestamps are merged according to the registered schema: a declared
    /// `createdAt` keeps its first value forever; a declared `updatedAt`
    /// moves only when the payload (ignoring both timestamps) differs from
    /// what is stored. Validation problems are attached as `$validation`.
    /// If the resulting bytes equal the stored file, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidName` for unusable names,
    /// `StoreError::SerializationError` if encoding fails, or
    /// `StoreError::Io` for filesystem errors.
    pub fn set(
        &self,
        entity_type: &str,
        instance: &str,
        data: &Map<String, Value>,
    ) -> Result<WriteOutcome> {
        let path = self.path(entity_type, instance)?;
        let existing_bytes = atomic::read_optional(&path)?;
        let previous = existing_bytes.as_deref().and_then(|bytes| {
            parse_document(&path, bytes)
                .map_err(|e| log::warn!("overwriting unreadable fact: {e}"))
                .ok()
                .map(|doc| SchemaRegistry::unwrap(&doc))
        });

        let mut payload = SchemaRegistry::unwrap(data);
        let registered = self.registry.get(entity_type);
        if let Some(schema) = registered {
            merge_timestamps(
                &mut payload,
                previous.as_ref(),
                schema.declares(CREATED_AT),
                schema.declares(UPDATED_AT),
            );
        }

        let version = registered.map_or(0, |s| s.version);
        let mut document = SchemaRegistry::wrap(&payload, entity_type, version);
        if registered.is_some() {
            let report = self
                .registry
                .validate(entity_type, &Value::Object(payload));
            if !report.is_clean() {
                log::debug!(
                    "fact {entity_type}/{instance} has {} validation error(s)",
                    report.errors.len()
                );
                let feedback = serde_json::to_value(&report)
                    .map_err(|e| StoreError::SerializationError(e.to_string()))?;
                document.insert(VALIDATION_KEY.to_string(), feedback);
            }
        }

        let mut bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        bytes.push(b'\n');

        if existing_bytes.as_deref() == Some(bytes.as_slice()) {
            log::debug!("fact {entity_type}/{instance} unchanged, skipping write");
            return Ok(WriteOutcome::Unchanged);
        }

        atomic::write_atomic(&path, &bytes, None)?;
        log::debug!("wrote fact {entity_type}/{instance} to {}", path.display());
        Ok(WriteOutcome::Written)
    }

    /// Remove a fact. Returns whether a file was removed; absent is fine.
    pub fn delete(&self, entity_type: &str, instance: &str) -> Result<bool> {
        let path = self.path(entity_type, instance)?;
        let removed = atomic::remove_if_exists(&path)?;
        if removed {
            log::debug!("deleted fact {entity_type}/{instance}");
        }
        Ok(removed)
    }

    /// Instance names stored for `entity_type`, sorted.
    pub fn list(&self, entity_type: &str) -> Result<Vec<String>> {
        atomic::list_json_stems(&self.layout.type_dir(entity_type)?)
    }
}

/// Decide whether the file at `fact_path` is stale relative to `raw_sources`.
///
/// - no raw sources: fresh;
/// - fact mtime unreadable: stale;
/// - any raw source missing or unreadable: stale;
/// - any raw source modified strictly after the fact: stale.
pub fn is_stale_against<P: AsRef<Path>>(fact_path: &Path, raw_sources: &[P]) -> bool {
    if raw_sources.is_empty() {
        return false;
    }
    let Some(fact_mtime) = atomic::modified(fact_path) else {
        return true;
    };
    raw_sources
        .iter()
        .any(|source| match atomic::modified(source.as_ref()) {
            Some(source_mtime) => source_mtime > fact_mtime,
            None => true,
        })
}

fn merge_timestamps(
    payload: &mut Map<String, Value>,
    previous: Option<&Map<String, Value>>,
    declares_created: bool,
    declares_updated: bool,
) {
    let now = time::now_rfc3339();

    if declares_created {
        let created = previous
            .and_then(|prev| prev.get(CREATED_AT))
            .or_else(|| payload.get(CREATED_AT))
            .filter(|v| v.is_string())
            .cloned()
            .unwrap_or_else(|| Value::String(now.clone()));
        payload.insert(CREATED_AT.to_string(), created);
    }

    if declares_updated {
        let unchanged = previous.is_some_and(|prev| {
            without_timestamps(prev) == without_timestamps(payload)
        });
        let updated = previous
            .filter(|_| unchanged)
            .and_then(|prev| prev.get(UPDATED_AT))
            .filter(|v| v.is_string())
            .cloned()
            .unwrap_or_else(|| {
                // A brand-new fact gets identical timestamps.
                match payload.get(CREATED_AT) {
                    Some(created) if previous.is_none() && declares_created => created.clone(),
                    _ => Value::String(now.clone()),
                }
            });
        payload.insert(UPDATED_AT.to_string(), updated);
    }
}

fn without_timestamps(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| key.as_str() != CREATED_AT && key.as_str() != UPDATED_AT)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn parse_document(path: &Path, bytes: &[u8]) -> Result<Map<String, Value>> {
    serde_json::from_slice(bytes).map_err(|e| {
        StoreError::InvalidFileFormat(format!("fact {} is not a JSON object: {e}", path.display()))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
