//! Symmetric encryption.
//!
//! Two schemes live here:
//!
//! - **Connection values**: AES-256-GCM under a key derived (HKDF-SHA256)
//!   from the workspace identity's Ed25519 seed. Output is
//!   `base64(nonce ‖ ciphertext ‖ tag)` with a fresh 12-byte nonce per call.
//! - **Key files**: ChaCha20-Poly1305 under a key derived with Argon2id
//!   from a user passphrase, used for local signing keys at rest.

use aes_gcm::aead::consts::U12;
use aes_gcm::Aes256Gcm;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use zeroize::Zeroize;

use crate::crypto::derivation;
use crate::crypto::keys::Ed25519KeyPair;
use crate::crypto::random::{random_nonce_12, random_salt_16};
use crate::error::{Result, StoreError};

/// Algorithm tag written in front of every encrypted connection value.
pub const VALUE_ALGORITHM: &str = "aes-256-gcm";

const NONCE_LEN: usize = 12;

type AesNonce = aes_gcm::Nonce<U12>;

/// Argon2id parameters for passphrase-based key derivation.
const ARGON2_M_COST: u32 = 65536; // 64 MiB
const ARGON2_T_COST: u32 = 3; // 3 iterations
const ARGON2_P_COST: u32 = 4; // 4 parallel lanes

// ── Connection values (AES-256-GCM) ───────────────────────────────────────────

/// Encrypt a secret string under the identity whose seed is `private_key_b64`.
pub fn encrypt_value(plaintext: &str, private_key_b64: &str) -> Result<String> {
    let mut key = value_key(private_key_b64)?;
    let sealed = aes_encrypt(&key, plaintext.as_bytes());
    key.zeroize();
    Ok(base64::engine::general_purpose::STANDARD.encode(sealed?))
}

/// Decrypt a value produced by [`encrypt_value`].
///
/// Fails with `DecryptionFailed` if the authentication tag does not verify,
/// which is what happens when the value was sealed under another identity.
pub fn decrypt_value(ciphertext_b64: &str, private_key_b64: &str) -> Result<String> {
    let sealed = base64::engine::general_purpose::STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| StoreError::DecryptionFailed(format!("invalid ciphertext base64: {e}")))?;

    let mut key = value_key(private_key_b64)?;
    let opened = aes_decrypt(&key, &sealed);
    key.zeroize();

    String::from_utf8(opened?).map_err(|e| {
        e.into_bytes().zeroize();
        StoreError::DecryptionFailed("plaintext is not UTF-8".into())
    })
}

/// AES-256-GCM encrypt, returning `nonce ‖ ciphertext ‖ tag`.
pub fn aes_encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce_bytes = random_nonce_12();
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| StoreError::EncryptionFailed(format!("cipher init: {e}")))?;
    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| StoreError::EncryptionFailed(format!("encrypt: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// AES-256-GCM decrypt a `nonce ‖ ciphertext ‖ tag` blob.
pub fn aes_decrypt(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() <= NONCE_LEN {
        return Err(StoreError::DecryptionFailed("ciphertext too short".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| StoreError::DecryptionFailed(format!("cipher init: {e}")))?;
    cipher
        .decrypt(AesNonce::from_slice(nonce), ciphertext)
        .map_err(|_| StoreError::DecryptionFailed("authentication tag mismatch".into()))
}

fn value_key(private_key_b64: &str) -> Result<[u8; 32]> {
    let pair = Ed25519KeyPair::from_base64(private_key_b64)?;
    let mut seed = pair.signing_key_bytes();
    let key = derivation::derive_key(&seed, derivation::connection_encryption_context());
    seed.zeroize();
    key
}

// ── Key files (Argon2id + ChaCha20-Poly1305) ──────────────────────────────────

/// Derive a 32-byte encryption key from a passphrase and salt using Argon2id.
pub fn derive_passphrase_key(passphrase: &[u8], salt: &[u8; 16]) -> Result<[u8; 32]> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
        .map_err(|e| StoreError::DerivationFailed(format!("Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| StoreError::DerivationFailed(format!("Argon2 hash: {e}")))?;

    Ok(output)
}

/// Encrypt plaintext with ChaCha20-Poly1305.
///
/// Returns `(nonce, ciphertext)`. The nonce must be stored alongside
/// the ciphertext for decryption.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let nonce_bytes = random_nonce_12();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| StoreError::EncryptionFailed(format!("cipher init: {e}")))?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| StoreError::EncryptionFailed(format!("encrypt: {e}")))?;
    Ok((nonce_bytes.to_vec(), ciphertext))
}

/// Decrypt ciphertext with ChaCha20-Poly1305.
pub fn decrypt(key: &[u8; 32], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(StoreError::DecryptionFailed("nonce must be 12 bytes".into()));
    }
    let nonce = Nonce::from_slice(nonce);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| StoreError::DecryptionFailed(format!("cipher init: {e}")))?;
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| StoreError::InvalidPassphrase)
}

/// Encrypt data with a passphrase. Returns `(salt, nonce, ciphertext)`.
pub fn encrypt_with_passphrase(
    passphrase: &[u8],
    plaintext: &[u8],
) -> Result<([u8; 16], Vec<u8>, Vec<u8>)> {
    let salt = random_salt_16();
    let mut key = passphrase_file_key(passphrase, &salt)?;
    let result = encrypt(&key, plaintext);
    key.zeroize();
    let (nonce, ciphertext) = result?;
    Ok((salt, nonce, ciphertext))
}

/// Decrypt data with a passphrase.
pub fn decrypt_with_passphrase(
    passphrase: &[u8],
    salt: &[u8; 16],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let mut key = passphrase_file_key(passphrase, salt)?;
    let result = decrypt(&key, nonce, ciphertext);
    key.zeroize();
    result
}

// passphrase → Argon2id(passphrase, salt) → master
// HKDF-SHA256(master, keyring context) → file key
fn passphrase_file_key(passphrase: &[u8], salt: &[u8; 16]) -> Result<[u8; 32]> {
    let mut master = derive_passphrase_key(passphrase, salt)?;
    let key = derivation::derive_key(&master, derivation::keyring_encryption_context());
    master.zeroize();
    key
}
