//! On-disk connection bundle formats.
//!
//! Current format, one independently sealed value per field:
//! ```json
//! { "config": { "token": "aes-256-gcm:default-did:key:z6Mk...:<base64>" } }
//! ```
//!
//! Two older shapes are still read and are rewritten on next access:
//! - whole bundle: `{"config": "<tag>"}`, one sealed JSON object of fields;
//! - plaintext: `{"config": {"token": "ghp_..."}}`, any value that does not
//!   carry a tag prefix, including stray values inside a current document.
//!
//! A value with a tag prefix whose body does not parse is corrupted
//! ciphertext, not plaintext, and fails the read.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use serde_json::{Map, Value};

use crate::crypto::did::is_did_key;
use crate::crypto::VALUE_ALGORITHM;
use crate::error::{Result, StoreError};
use crate::identity::IdentityKey;

/// Top-level key of every bundle document.
pub const CONFIG_KEY: &str = "config";

const DID_MARKER: &str = "-did:";
const DID_KEY_MARKER: &str = "-did:key:";

/// A tagged ciphertext: `algorithm ":" keyName "-" did ":" base64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedValue {
    pub algorithm: String,
    pub key_name: String,
    pub did: String,
    pub ciphertext: String,
}

impl SealedValue {
    /// Encrypt `plaintext` under `key` and tag the result.
    pub fn seal(key: &IdentityKey, plaintext: &str) -> Result<Self> {
        Ok(Self {
            algorithm: VALUE_ALGORITHM.to_string(),
            key_name: key.name().to_string(),
            did: key.did().to_string(),
            ciphertext: key.encrypt(plaintext)?,
        })
    }

    /// Whether `value` claims to be sealed: the algorithm prefix followed
    /// by a `did:key` identity. Such a value is never treated as plaintext.
    pub fn looks_sealed(value: &str) -> bool {
        value
            .split_once(':')
            .is_some_and(|(algorithm, rest)| {
                algorithm == VALUE_ALGORITHM && rest.contains(DID_KEY_MARKER)
            })
    }

    /// Parse a tagged value. Anything that does not match is `None`.
    ///
    /// The algorithm ends at the first colon and the ciphertext starts
    /// after the last one, since the DID in between contains colons of its
    /// own. The identity splits at the last `-did:`, so key names may
    /// contain dashes.
    pub fn parse(tagged: &str) -> Option<Self> {
        let (algorithm, rest) = tagged.split_once(':')?;
        if algorithm != VALUE_ALGORITHM {
            return None;
        }
        let (identity, ciphertext) = rest.rsplit_once(':')?;
        let split = identity.rfind(DID_MARKER)?;
        let key_name = &identity[..split];
        let did = &identity[split + 1..];
        if key_name.is_empty() || !is_did_key(did) || ciphertext.is_empty() {
            return None;
        }
        base64::engine::general_purpose::STANDARD
            .decode(ciphertext)
            .ok()?;
        Some(Self {
            algorithm: algorithm.to_string(),
            key_name: key_name.to_string(),
            did: did.to_string(),
            ciphertext: ciphertext.to_string(),
        })
    }

    /// `<keyName>-<did>` of the key that sealed this value.
    pub fn key_tag(&self) -> String {
        format!("{}-{}", self.key_name, self.did)
    }

    /// Whether `key` is the identity this value claims to be sealed under.
    pub fn sealed_by(&self, key: &IdentityKey) -> bool {
        self.key_name == key.name() && self.did == key.did()
    }

    /// Decrypt with `key`.
    pub fn open(&self, key: &IdentityKey) -> Result<String> {
        key.decrypt(&self.ciphertext)
    }
}

impl fmt::Display for SealedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.algorithm, self.key_name, self.did, self.ciphertext
        )
    }
}

/// A bundle document, decoded once at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleFormat {
    /// Every field is a tagged ciphertext.
    Current(BTreeMap<String, SealedValue>),
    /// The whole field map sealed as one JSON string.
    LegacyWholeBundle(SealedValue),
    /// At least one field holds a plain value.
    LegacyPlaintext {
        sealed: BTreeMap<String, SealedValue>,
        plaintext: BTreeMap<String, String>,
    },
}

impl BundleFormat {
    /// Classify a parsed bundle document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidFileFormat` when the document has no
    /// `config` member, or `config` is neither an object nor a tagged
    /// string.
    pub fn decode(bundle: &str, document: &Value) -> Result<Self> {
        let config = document
            .as_object()
            .and_then(|doc| doc.get(CONFIG_KEY))
            .ok_or_else(|| {
                StoreError::InvalidFileFormat(format!(
                    "connection '{bundle}' has no \"{CONFIG_KEY}\" object"
                ))
            })?;

        match config {
            Value::String(tagged) => match SealedValue::parse(tagged) {
                Some(sealed) => Ok(BundleFormat::LegacyWholeBundle(sealed)),
                None if SealedValue::looks_sealed(tagged) => Err(corrupted(bundle, CONFIG_KEY)),
                None => Err(StoreError::InvalidFileFormat(format!(
                    "connection '{bundle}' holds an unrecognized sealed bundle"
                ))),
            },
            Value::Object(fields) => {
                let mut sealed = BTreeMap::new();
                let mut plaintext = BTreeMap::new();
                for (field, value) in fields {
                    let text = value.as_str();
                    match text.and_then(SealedValue::parse) {
                        Some(s) => {
                            sealed.insert(field.clone(), s);
                        }
                        None if text.is_some_and(SealedValue::looks_sealed) => {
                            return Err(corrupted(bundle, field));
                        }
                        None => {
                            plaintext.insert(field.clone(), scalar_to_string(value));
                        }
                    }
                }
                if plaintext.is_empty() {
                    Ok(BundleFormat::Current(sealed))
                } else {
                    Ok(BundleFormat::LegacyPlaintext { sealed, plaintext })
                }
            }
            _ => Err(StoreError::InvalidFileFormat(format!(
                "connection '{bundle}' has a non-object \"{CONFIG_KEY}\""
            ))),
        }
    }

    /// Whether reading this bundle should rewrite it in the current form.
    pub fn needs_migration(&self) -> bool {
        !matches!(self, BundleFormat::Current(_))
    }

    /// Encode sealed fields as a current-format document.
    pub fn encode(fields: &BTreeMap<String, SealedValue>) -> Value {
        let config: Map<String, Value> = fields
            .iter()
            .map(|(field, sealed)| (field.clone(), Value::String(sealed.to_string())))
            .collect();
        let mut document = Map::new();
        document.insert(CONFIG_KEY.to_string(), Value::Object(config));
        Value::Object(document)
    }
}

/// Parse the plaintext of a whole-bundle ciphertext into fields.
pub(crate) fn fields_from_json(bundle: &str, plaintext: &str) -> Result<BTreeMap<String, String>> {
    let value: Value = serde_json::from_str(plaintext).map_err(|e| {
        StoreError::InvalidFileFormat(format!(
            "sealed bundle '{bundle}' is not a JSON object: {e}"
        ))
    })?;
    let Value::Object(fields) = value else {
        return Err(StoreError::InvalidFileFormat(format!(
            "sealed bundle '{bundle}' is not a JSON object"
        )));
    };
    Ok(fields
        .iter()
        .map(|(k, v)| (k.clone(), scalar_to_string(v)))
        .collect())
}

fn corrupted(bundle: &str, field: &str) -> StoreError {
    StoreError::DecryptionFailed(format!(
        "field '{field}' of connection '{bundle}' has a corrupted sealed value"
    ))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
