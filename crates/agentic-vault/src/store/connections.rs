//! Connection bundles: named sets of credentials, encrypted per field.
//!
//! Every value is sealed independently under the active identity key and
//! tagged with that key's name and DID, so a bundle written on another
//! machine fails loudly with both identities in the error instead of
//! decrypting to garbage. A bundle that cannot be decrypted is never
//! modified.

use std::collections::BTreeMap;

use crate::error::{Result, StoreError};
use crate::identity::{IdentityKey, IdentityManager};
use crate::storage::atomic::{self, OWNER_READ_WRITE};
use crate::store::bundle::{fields_from_json, BundleFormat, SealedValue, CONFIG_KEY};
use crate::store::paths::StoreLayout;
use crate::store::prompt::{CredentialPrompter, PromptSession};

/// Decrypted field values of one bundle.
pub type Credentials = BTreeMap<String, String>;

/// Filesystem-backed store for connection bundles.
pub struct ConnectionStore {
    layout: StoreLayout,
    identities: IdentityManager,
}

impl ConnectionStore {
    pub fn new(layout: StoreLayout, identities: IdentityManager) -> Self {
        Self { layout, identities }
    }

    pub fn identities(&self) -> &IdentityManager {
        &self.identities
    }

    /// Read and decrypt a bundle. Returns `Ok(None)` if it does not exist.
    ///
    /// Bundles in a legacy format are rewritten in the current format once
    /// they have been read successfully.
    ///
    /// # Errors
    ///
    /// - `StoreError::KeyFileMissing` if the bundle holds ciphertext but the
    ///   active identity key does not exist;
    /// - `StoreError::KeyMismatch` if a value does not decrypt under the
    ///   active key (the file is left as is);
    /// - `StoreError::DecryptionFailed` if a value is tagged but damaged,
    ///   or tagged with the active key and fails authentication;
    /// - `StoreError::InvalidFileFormat` for unrecognized documents.
    pub fn get(&self, bundle: &str) -> Result<Option<Credentials>> {
        let path = self.layout.bundle_path(bundle)?;
        let Some(bytes) = atomic::read_optional(&path)? else {
            return Ok(None);
        };
        let document: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::InvalidFileFormat(format!("{}: {e}", path.display()))
        })?;
        let format = BundleFormat::decode(bundle, &document)?;

        let values = match &format {
            BundleFormat::Current(sealed) => {
                let key = self.require_active(sealed.is_empty())?;
                open_fields(bundle, sealed, key.as_ref())?
            }
            BundleFormat::LegacyWholeBundle(sealed) => {
                let key = self.require_active(false)?;
                let plaintext = open_field(bundle, CONFIG_KEY, sealed, key.as_ref())?;
                fields_from_json(bundle, &plaintext)?
            }
            BundleFormat::LegacyPlaintext { sealed, plaintext } => {
                let key = self.require_active(sealed.is_empty())?;
                let mut values = open_fields(bundle, sealed, key.as_ref())?;
                values.extend(plaintext.iter().map(|(k, v)| (k.clone(), v.clone())));
                values
            }
        };

        if format.needs_migration() {
            log::debug!("migrating connection '{bundle}' to per-field encryption");
            self.set(bundle, &values)?;
        }
        Ok(Some(values))
    }

    /// Encrypt and write a bundle, replacing whatever was stored.
    ///
    /// Creates the active identity key on first use.
    pub fn set(&self, bundle: &str, values: &Credentials) -> Result<()> {
        let path = self.layout.bundle_path(bundle)?;
        let key = self.identities.ensure_active()?;

        let mut sealed = BTreeMap::new();
        for (field, value) in values {
            sealed.insert(field.clone(), SealedValue::seal(&key, value)?);
        }

        let mut bytes = serde_json::to_vec_pretty(&BundleFormat::encode(&sealed))
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        bytes.push(b'\n');
        atomic::write_atomic(&path, &bytes, Some(OWNER_READ_WRITE))?;
        log::debug!(
            "wrote connection '{bundle}' ({} field(s)) under {}",
            sealed.len(),
            key.name()
        );
        Ok(())
    }

    /// One field of a bundle, prompting for it if it is not stored.
    ///
    /// Each `(bundle, field)` is prompted for at most once per `session`.
    /// An answer is persisted before it is returned.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ValueMissing` when the field is absent and no
    /// answer was given, plus any error from [`get`](Self::get) or
    /// [`set`](Self::set).
    pub fn get_value(
        &self,
        bundle: &str,
        field: &str,
        prompter: &mut dyn CredentialPrompter,
        session: &mut PromptSession,
    ) -> Result<String> {
        let mut values = self.get(bundle)?.unwrap_or_default();
        if let Some(value) = values.get(field) {
            return Ok(value.clone());
        }

        let missing = || StoreError::ValueMissing {
            bundle: bundle.to_string(),
            field: field.to_string(),
        };
        if !session.begin(bundle, field) {
            return Err(missing());
        }
        let answer = prompter
            .prompt(bundle, field)?
            .filter(|v| !v.is_empty())
            .ok_or_else(missing)?;

        values.insert(field.to_string(), answer.clone());
        self.set(bundle, &values)?;
        Ok(answer)
    }

    /// Remove a bundle. Returns whether a file was removed.
    pub fn delete(&self, bundle: &str) -> Result<bool> {
        let removed = atomic::remove_if_exists(&self.layout.bundle_path(bundle)?)?;
        if removed {
            log::debug!("deleted connection '{bundle}'");
        }
        Ok(removed)
    }

    /// Names of all stored bundles, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        atomic::list_json_stems(self.layout.connections_dir())
    }

    /// Load the active key. A missing key is tolerated only when there is
    /// nothing to decrypt.
    fn require_active(&self, nothing_sealed: bool) -> Result<Option<IdentityKey>> {
        match self.identities.active()? {
            Some(key) => Ok(Some(key)),
            None if nothing_sealed => Ok(None),
            None => Err(StoreError::KeyFileMissing(
                self.layout
                    .identity_key_path(self.identities.active_name())?,
            )),
        }
    }
}

fn open_fields(
    bundle: &str,
    sealed: &BTreeMap<String, SealedValue>,
    key: Option<&IdentityKey>,
) -> Result<Credentials> {
    let mut values = Credentials::new();
    for (field, value) in sealed {
        values.insert(field.clone(), open_field(bundle, field, value, key)?);
    }
    Ok(values)
}

fn open_field(
    bundle: &str,
    field: &str,
    sealed: &SealedValue,
    key: Option<&IdentityKey>,
) -> Result<String> {
    let Some(key) = key else {
        return Err(StoreError::InvalidKey(format!(
            "no identity key available to open '{bundle}'"
        )));
    };
    sealed.open(key).map_err(|e| {
        log::debug!("field '{field}' of '{bundle}' did not decrypt: {e}");
        if sealed.sealed_by(key) {
            return StoreError::DecryptionFailed(format!(
                "field '{field}' of connection '{bundle}' is sealed under the active key \
                 but failed authentication: {e}"
            ));
        }
        StoreError::KeyMismatch {
            bundle: bundle.to_string(),
            field: field.to_string(),
            encrypted_with: sealed.key_tag(),
            active: key.tag(),
        }
    })
}
