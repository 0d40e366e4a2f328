//! Ed25519 key pair generation and encoding.
//!
//! Ed25519 keys anchor both the workspace identity (whose DID tags every
//! encrypted credential) and the local signing keys discovered by the
//! keyring.

use base64::Engine as _;
use ed25519_dalek::{SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::error::{Result, StoreError};

/// An Ed25519 key pair.
///
/// The signing key is zeroized on drop to prevent private key leakage.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a key pair from raw signing key bytes.
    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a key pair from a base64-encoded 32-byte seed.
    pub fn from_base64(private_key_b64: &str) -> Result<Self> {
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(private_key_b64.trim())
            .map_err(|e| StoreError::InvalidKey(format!("invalid private key base64: {e}")))?;
        let bytes: std::result::Result<[u8; 32], _> = raw.as_slice().try_into();
        raw.zeroize();
        let mut bytes =
            bytes.map_err(|_| StoreError::InvalidKey("private key must be 32 bytes".into()))?;
        let pair = Self::from_signing_key_bytes(&bytes);
        bytes.zeroize();
        Ok(pair)
    }

    /// Reconstruct a verifying key from raw bytes.
    pub fn verifying_key_from_bytes(bytes: &[u8; 32]) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(bytes)
            .map_err(|e| StoreError::InvalidKey(format!("invalid verifying key: {e}")))
    }

    /// Return the verifying (public) key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Return the signing key bytes. Caller must zeroize after use.
    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Return the verifying key bytes.
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Return the signing key as base64. Caller owns the secret string.
    pub fn signing_key_base64(&self) -> String {
        let mut bytes = self.signing_key_bytes();
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        bytes.zeroize();
        encoded
    }

    /// Return the public key as base64.
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.verifying_key_bytes())
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        // SigningKey stores bytes internally; zeroize via conversion
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
