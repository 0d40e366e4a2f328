//! Key derivation using HKDF-SHA256.
//!
//! Symmetric keys are never the Ed25519 seed itself: each purpose gets its
//! own child key derived under a context string.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Result, StoreError};

/// Derive a 32-byte child key from a root key and context string.
///
/// Uses HKDF-SHA256 (RFC 5869) with the root key as IKM and
/// the context as info.
pub fn derive_key(root_key_bytes: &[u8; 32], context: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, root_key_bytes);
    let mut output = [0u8; 32];
    hk.expand(context.as_bytes(), &mut output)
        .map_err(|e| StoreError::DerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}

/// Context for the AES key that encrypts connection values.
///
/// Must remain stable across versions or every stored credential becomes
/// unreadable.
pub fn connection_encryption_context() -> &'static str {
    "agentic-vault/connection-encryption"
}

/// Context for the ChaCha20 key that protects local signing key files.
pub fn keyring_encryption_context() -> &'static str {
    "agentic-vault/keyring-encryption"
}
