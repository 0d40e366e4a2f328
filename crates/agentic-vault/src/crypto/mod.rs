//! Cryptographic primitives for AgenticVault.
//!
//! This module provides:
//! - Ed25519 key generation and base64 encoding
//! - `did:key` derivation from Ed25519 public keys
//! - HKDF-SHA256 key derivation
//! - AES-256-GCM per-value encryption for connection secrets
//! - Argon2id + ChaCha20-Poly1305 passphrase encryption for key files
//! - Cryptographically secure random number generation

pub mod derivation;
pub mod did;
pub mod encryption;
pub mod keys;
pub mod random;

pub use did::did_for;
pub use encryption::{decrypt_value, encrypt_value, VALUE_ALGORITHM};
pub use keys::Ed25519KeyPair;

/// A freshly generated identity key pair.
#[derive(Debug, Clone)]
pub struct GeneratedKeypair {
    /// `did:key` identifier of the public key.
    pub did: String,
    /// Base64-encoded 32-byte Ed25519 seed.
    pub private_key: String,
}

/// Generate a new Ed25519 key pair with its DID.
pub fn generate_keypair() -> GeneratedKeypair {
    let pair = Ed25519KeyPair::generate();
    GeneratedKeypair {
        did: did::did_from_verifying_key(pair.verifying_key()),
        private_key: pair.signing_key_base64(),
    }
}
