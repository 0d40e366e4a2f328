//! Error types for AgenticVault.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material and secret values are never included in
//! error messages.
//!
//! Absent facts and bundles are not errors (`Ok(None)`), and schema
//! problems are reported as [`ValidationReport`](crate::store::ValidationReport)
//! data. What remains here are hard failures: I/O, malformed documents,
//! invalid names, and key errors. Key errors are fatal; see
//! [`StoreError::is_fatal`].

use std::path::PathBuf;

/// Vault error types covering all store and key operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Key file is not passphrase protected: {}", .0.display())]
    PassphraseRequired(PathBuf),

    #[error("Key file missing: {}", .0.display())]
    KeyFileMissing(PathBuf),

    #[error("Corrupted key file {}: {reason}", path.display())]
    CorruptKeyFile { path: PathBuf, reason: String },

    #[error(
        "Fingerprint mismatch for {}: recorded {expected}, found {actual}",
        path.display()
    )]
    FingerprintMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Identity key '{name}' is inconsistent: stored DID {stored} does not match its private key ({derived})")]
    IdentityMismatch {
        name: String,
        stored: String,
        derived: String,
    },

    #[error(
        "Cannot decrypt field '{field}' of connection '{bundle}': \
         value was encrypted with {encrypted_with}, active key is {active}"
    )]
    KeyMismatch {
        bundle: String,
        field: String,
        encrypted_with: String,
        active: String,
    },

    #[error("Value missing: field '{field}' of connection '{bundle}'")]
    ValueMissing { bundle: String, field: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Wrap an `std::io::Error` with the path it occurred on, logging it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        log::error!("I/O failure at {}: {source}", path.display());
        StoreError::Io { path, source }
    }

    /// Whether this error requires manual intervention.
    ///
    /// Fatal errors concern key material: the caller must stop and must
    /// not regenerate, delete, or overwrite anything in response.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::KeyMismatch { .. }
                | StoreError::KeyFileMissing(_)
                | StoreError::CorruptKeyFile { .. }
                | StoreError::FingerprintMismatch { .. }
                | StoreError::IdentityMismatch { .. }
                | StoreError::PassphraseRequired(_)
                | StoreError::DecryptionFailed(_)
        )
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
