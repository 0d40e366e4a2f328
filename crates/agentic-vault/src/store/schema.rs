//! Schema registry: JSON Schemas keyed by entity type.
//!
//! Schemas are registered once at startup, persisted next to the facts
//! they describe, and used for best-effort validation. Validation never
//! fails a write: facts often come from third-party APIs whose shape
//! drifts, so problems are reported as a [`ValidationReport`] and stored
//! with the fact instead.
//!
//! Schema file format (`schemas/{entity~type}.json`):
//! ```json
//! {
//!     "$schema": "https://json-schema.org/draft/2020-12/schema",
//!     "$id": "deployment-status.v1",
//!     "type": "object",
//!     "properties": { ... }
//! }
//! ```

use std::collections::HashMap;

use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::storage::atomic;
use crate::store::paths::StoreLayout;
use crate::store::WriteOutcome;

/// Dialect URI written as `$schema` on every schema and fact document.
pub const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Document key holding the dialect URI.
pub const SCHEMA_KEY: &str = "$schema";
/// Document key holding `<entity-type>.v<version>`.
pub const ID_KEY: &str = "$id";
/// Document key holding validation feedback attached at write time.
pub const VALIDATION_KEY: &str = "$validation";

// ── Validation results ────────────────────────────────────────────────────────

/// One failed schema check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON pointer into the validated instance (`""` for the root).
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// Schema keyword that failed (`type`, `required`, ...).
    pub keyword: String,
}

/// Outcome of validating data against a registered schema.
///
/// This is data, not an error: callers decide whether an invalid fact
/// matters to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// True when there are no errors. Warnings do not make data invalid.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when there is nothing to report at all.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    fn schema_not_found(entity_type: &str) -> Self {
        Self {
            errors: vec![FieldError {
                path: String::new(),
                message: format!("schema not found for entity type '{entity_type}'"),
                keyword: "$schema".to_string(),
            }],
            warnings: Vec::new(),
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// A schema held in memory by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredSchema {
    pub entity_type: String,
    pub version: u32,
    /// The schema body without `$schema`/`$id`.
    pub schema: Value,
}

impl RegisteredSchema {
    /// Whether the schema declares `field` under its top-level `properties`.
    pub fn declares(&self, field: &str) -> bool {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(field))
    }
}

/// In-process registry of entity-type schemas, persisted under `schemas/`.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    layout: StoreLayout,
    schemas: HashMap<String, RegisteredSchema>,
}

impl SchemaRegistry {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            schemas: HashMap::new(),
        }
    }

    /// Register `schema` for `entity_type` and persist it.
    ///
    /// The schema file is only rewritten when its bytes would change.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidFileFormat` if `schema` is not a JSON
    /// object, `StoreError::InvalidName` for an unusable entity type, or
    /// `StoreError::Io` for filesystem errors.
    pub fn register(
        &mut self,
        entity_type: &str,
        schema: Value,
        version: u32,
    ) -> Result<WriteOutcome> {
        let Value::Object(body) = schema else {
            return Err(StoreError::InvalidFileFormat(format!(
                "schema for '{entity_type}' must be a JSON object"
            )));
        };
        let path = self.layout.schema_path(entity_type)?;
        let body = Self::unwrap(&body);

        let document = Self::wrap(&body, entity_type, version);
        let mut bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        bytes.push(b'\n');

        let outcome = if atomic::read_optional(&path)?.as_deref() == Some(bytes.as_slice()) {
            log::debug!("schema {entity_type} unchanged at {}", path.display());
            WriteOutcome::Unchanged
        } else {
            atomic::write_atomic(&path, &bytes, None)?;
            log::debug!("wrote schema {entity_type}.v{version} to {}", path.display());
            WriteOutcome::Written
        };

        // Recorded only once the file on disk matches.
        self.schemas.insert(
            entity_type.to_string(),
            RegisteredSchema {
                entity_type: entity_type.to_string(),
                version,
                schema: Value::Object(body),
            },
        );
        Ok(outcome)
    }

    /// Rehydrate the registry from schema files already on disk.
    ///
    /// Files whose `$id` is not `<type>.v<version>` are skipped with a
    /// warning. Returns the number of schemas loaded.
    pub fn load_dir(&mut self) -> Result<usize> {
        let dir = self.layout.schemas_dir().clone();
        let mut loaded = 0;
        for stem in atomic::list_json_stems(&dir)? {
            let path = dir.join(format!("{stem}.json"));
            let Some(bytes) = atomic::read_optional(&path)? else {
                continue;
            };
            let document: Map<String, Value> = match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    log::warn!("skipping unreadable schema {}: {e}", path.display());
                    continue;
                }
            };
            let Some((entity_type, version)) = document
                .get(ID_KEY)
                .and_then(Value::as_str)
                .and_then(parse_schema_id)
            else {
                log::warn!("skipping schema without a versioned $id: {}", path.display());
                continue;
            };
            self.schemas.insert(
                entity_type.clone(),
                RegisteredSchema {
                    entity_type,
                    version,
                    schema: Value::Object(Self::unwrap(&document)),
                },
            );
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn get(&self, entity_type: &str) -> Option<&RegisteredSchema> {
        self.schemas.get(entity_type)
    }

    /// Registered version of `entity_type`, if any.
    pub fn version(&self, entity_type: &str) -> Option<u32> {
        self.get(entity_type).map(|s| s.version)
    }

    pub fn declares_field(&self, entity_type: &str, field: &str) -> bool {
        self.get(entity_type).is_some_and(|s| s.declares(field))
    }

    /// Registered entity types, sorted.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Validate `data` against the schema registered for `entity_type`.
    ///
    /// A schema that fails to compile yields a warning and no errors. An
    /// unregistered type yields a single "schema not found" error.
    pub fn validate(&self, entity_type: &str, data: &Value) -> ValidationReport {
        let Some(registered) = self.get(entity_type) else {
            return ValidationReport::schema_not_found(entity_type);
        };

        let validator = match jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&registered.schema)
        {
            Ok(validator) => validator,
            Err(e) => {
                log::warn!("schema for {entity_type} does not compile: {e}");
                return ValidationReport {
                    errors: Vec::new(),
                    warnings: vec![format!(
                        "schema for '{entity_type}' failed to compile: {e}"
                    )],
                };
            }
        };

        let errors = validator
            .iter_errors(data)
            .map(|err| {
                let schema_path = err.schema_path.to_string();
                FieldError {
                    path: err.instance_path.to_string(),
                    message: err.to_string(),
                    keyword: keyword_of(&schema_path),
                }
            })
            .collect();

        ValidationReport {
            errors,
            warnings: Vec::new(),
        }
    }

    /// Return a copy of `data` led by `$schema` and `$id`.
    ///
    /// Any `$schema`/`$id` already present in `data` are replaced; the input
    /// is not modified.
    pub fn wrap(data: &Map<String, Value>, entity_type: &str, version: u32) -> Map<String, Value> {
        let mut document = Map::with_capacity(data.len() + 2);
        document.insert(SCHEMA_KEY.to_string(), Value::String(SCHEMA_DIALECT.to_string()));
        document.insert(
            ID_KEY.to_string(),
            Value::String(schema_id(entity_type, version)),
        );
        for (key, value) in data {
            if key != SCHEMA_KEY && key != ID_KEY {
                document.insert(key.clone(), value.clone());
            }
        }
        document
    }

    /// Return `document` without `$schema`, `$id`, and validation feedback.
    pub fn unwrap(document: &Map<String, Value>) -> Map<String, Value> {
        document
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), SCHEMA_KEY | ID_KEY | VALIDATION_KEY))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// `<entity-type>.v<version>`
pub fn schema_id(entity_type: &str, version: u32) -> String {
    format!("{entity_type}.v{version}")
}

/// Split a `$id` of the form `<entity-type>.v<version>`.
pub fn parse_schema_id(id: &str) -> Option<(String, u32)> {
    let (entity_type, version) = id.rsplit_once(".v")?;
    if entity_type.is_empty() {
        return None;
    }
    Some((entity_type.to_string(), version.parse().ok()?))
}

/// Last segment of a schema path JSON pointer, i.e. the failing keyword.
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
