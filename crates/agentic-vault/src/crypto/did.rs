//! `did:key` identifiers for Ed25519 public keys.
//!
//! Format: `did:key:z` + base58btc(multicodec `0xed 0x01` ‖ public key).
//! The `z` is the multibase prefix for base58btc.

use ed25519_dalek::VerifyingKey;

use crate::crypto::keys::Ed25519KeyPair;
use crate::error::{Result, StoreError};

const DID_KEY_PREFIX: &str = "did:key:";
const MULTIBASE_BASE58BTC: char = 'z';
const ED25519_PUB_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Encode a verifying key as a `did:key` DID.
pub fn did_from_verifying_key(key: &VerifyingKey) -> String {
    let mut bytes = Vec::with_capacity(34);
    bytes.extend_from_slice(&ED25519_PUB_MULTICODEC);
    bytes.extend_from_slice(key.as_bytes());
    format!(
        "{DID_KEY_PREFIX}{MULTIBASE_BASE58BTC}{}",
        bs58::encode(bytes).into_string()
    )
}

/// Derive the DID for a base64-encoded private key.
pub fn did_for(private_key_b64: &str) -> Result<String> {
    let pair = Ed25519KeyPair::from_base64(private_key_b64)?;
    Ok(did_from_verifying_key(pair.verifying_key()))
}

/// Decode a `did:key` DID back into its Ed25519 verifying key.
pub fn verifying_key_from_did(did: &str) -> Result<VerifyingKey> {
    let encoded = did
        .strip_prefix(DID_KEY_PREFIX)
        .and_then(|rest| rest.strip_prefix(MULTIBASE_BASE58BTC))
        .ok_or_else(|| StoreError::InvalidKey(format!("not a base58btc did:key: {did}")))?;

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| StoreError::InvalidKey(format!("invalid did:key base58: {e}")))?;

    let key = bytes
        .strip_prefix(&ED25519_PUB_MULTICODEC)
        .ok_or_else(|| StoreError::InvalidKey("did:key is not an Ed25519 key".into()))?;
    let key: [u8; 32] = key
        .try_into()
        .map_err(|_| StoreError::InvalidKey("did:key public key must be 32 bytes".into()))?;

    Ed25519KeyPair::verifying_key_from_bytes(&key)
}

/// Whether `s` is syntactically a `did:key` DID.
pub fn is_did_key(s: &str) -> bool {
    verifying_key_from_did(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed25519_did_starts_with_z6mk() {
        let kp = Ed25519KeyPair::generate();
        let did = did_from_verifying_key(kp.verifying_key());
        // 0xed01 prefix always encodes to "6Mk" in base58btc
        assert!(did.starts_with("did:key:z6Mk"), "got {did}");
    }

    #[test]
    fn test_did_for_is_deterministic() {
        let kp = Ed25519KeyPair::generate();
        let b64 = kp.signing_key_base64();
        assert_eq!(did_for(&b64).unwrap(), did_for(&b64).unwrap());
        assert_eq!(
            did_for(&b64).unwrap(),
            did_from_verifying_key(kp.verifying_key())
        );
    }

    #[test]
    fn test_did_roundtrip_to_verifying_key() {
        let kp = Ed25519KeyPair::generate();
        let did = did_from_verifying_key(kp.verifying_key());
        let key = verifying_key_from_did(&did).unwrap();
        assert_eq!(key.to_bytes(), kp.verifying_key_bytes());
    }

    #[test]
    fn test_rejects_non_did_key() {
        assert!(!is_did_key("did:web:example.com"));
        assert!(!is_did_key("did:key:6Mkabc"));
        assert!(!is_did_key("did:key:z0OIl"));
    }
}
