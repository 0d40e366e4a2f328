//! Local signing keys: passphrase-protected Ed25519 pairs on disk.
//!
//! A key pair is two sibling files in the keyring directory:
//!
//! ```text
//! {dir}/
//! ├── {name}        private key, encrypted (JSON, mode 0600)
//! └── {name}.pub    "ed25519 <base64-public-key> <comment>"
//! ```
//!
//! Private file format:
//! ```json
//! {
//!     "version": 1,
//!     "format": "avk-v1",
//!     "encryption": {
//!         "algorithm": "chacha20-poly1305",
//!         "kdf": "argon2id",
//!         "salt": "<base64-16-bytes>",
//!         "nonce": "<base64-12-bytes>"
//!     },
//!     "encryptedKey": "<base64-ciphertext>",
//!     "publicKey": "<base64-32-bytes>"
//! }
//! ```
//!
//! Every key must carry a passphrase. This is checked by round-trip: if the
//! private key opens with an empty passphrase, it is not protected.
//! Missing files, corrupted files, and fingerprint drift are fatal; this
//! module never regenerates or deletes key material.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::encryption;
use crate::crypto::keys::Ed25519KeyPair;
use crate::error::{Result, StoreError};
use crate::storage::atomic::{self, OWNER_READ_WRITE};

// ── File format constants ─────────────────────────────────────────────────────

const KEY_VERSION: u32 = 1;
const KEY_FORMAT: &str = "avk-v1";
const KEY_ALGORITHM: &str = "chacha20-poly1305";
const KEY_KDF: &str = "argon2id";
const PUBLIC_SUFFIX: &str = "pub";
const PUBLIC_KEY_TYPE: &str = "ed25519";

// ── On-disk structures ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrivateKeyFile {
    version: u32,
    format: String,
    encryption: EncryptionMetadata,
    encrypted_key: String,
    public_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncryptionMetadata {
    algorithm: String,
    kdf: String,
    salt: String,
    nonce: String,
}

/// A key pair found in the keyring directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairFiles {
    pub name: String,
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

/// A parsed `.pub` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyFile {
    pub public_key: [u8; 32],
    pub comment: String,
}

impl PublicKeyFile {
    /// `SHA256:` + unpadded base64 of SHA-256(public key).
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.public_key)
    }

    fn render(&self) -> String {
        let key = base64::engine::general_purpose::STANDARD.encode(self.public_key);
        if self.comment.is_empty() {
            format!("{PUBLIC_KEY_TYPE} {key}\n")
        } else {
            format!("{PUBLIC_KEY_TYPE} {key} {}\n", self.comment)
        }
    }

    fn parse(path: &Path, text: &str) -> Result<Self> {
        let corrupt = |reason: &str| StoreError::CorruptKeyFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let mut parts = text.trim().splitn(3, ' ');
        if parts.next() != Some(PUBLIC_KEY_TYPE) {
            return Err(corrupt("not an ed25519 public key"));
        }
        let encoded = parts.next().ok_or_else(|| corrupt("missing key data"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| corrupt("invalid public key base64"))?;
        let public_key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| corrupt("public key must be 32 bytes"))?;
        Ed25519KeyPair::verifying_key_from_bytes(&public_key)
            .map_err(|_| corrupt("not a valid ed25519 point"))?;
        Ok(Self {
            public_key,
            comment: parts.next().unwrap_or_default().trim().to_string(),
        })
    }
}

/// The configured signing key and the fingerprint recorded when it was
/// first accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedKey {
    pub private_path: PathBuf,
    pub fingerprint: String,
}

// ── LocalKeyring ──────────────────────────────────────────────────────────────

/// Discovery and validation of passphrase-protected signing keys.
pub struct LocalKeyring {
    dir: PathBuf,
}

impl LocalKeyring {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Find every pair whose `.pub` file has a sibling private file.
    ///
    /// Sorted by name. A missing directory yields an empty list.
    pub fn discover(&self) -> Result<Vec<KeyPairFiles>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut pairs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let public_path = entry.path();
            if public_path.extension().and_then(|e| e.to_str()) != Some(PUBLIC_SUFFIX) {
                continue;
            }
            let private_path = public_path.with_extension("");
            if !private_path.is_file() {
                continue;
            }
            let Some(name) = private_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            pairs.push(KeyPairFiles {
                name: name.to_string(),
                private_path: private_path.clone(),
                public_path,
            });
        }
        pairs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pairs)
    }

    /// Generate a new pair under `name`, protected by `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::PassphraseRequired` for an empty passphrase and
    /// `StoreError::InvalidKey` if either file already exists.
    pub fn create(&self, name: &str, passphrase: &str, comment: &str) -> Result<KeyPairFiles> {
        let files = self.files_for(name)?;
        if passphrase.is_empty() {
            return Err(StoreError::PassphraseRequired(files.private_path));
        }
        if files.private_path.exists() || files.public_path.exists() {
            return Err(StoreError::InvalidKey(format!(
                "signing key '{name}' already exists in {}",
                self.dir.display()
            )));
        }

        let pair = Ed25519KeyPair::generate();
        write_private_file(&files.private_path, &pair, passphrase)?;
        let public = PublicKeyFile {
            public_key: pair.verifying_key_bytes(),
            comment: comment.trim().to_string(),
        };
        atomic::write_atomic(&files.public_path, public.render().as_bytes(), None)?;
        log::info!("created signing key '{name}' ({})", public.fingerprint());
        Ok(files)
    }

    /// Decrypt the private key of `files` and check it against its `.pub`.
    pub fn open(&self, files: &KeyPairFiles, passphrase: &str) -> Result<Ed25519KeyPair> {
        let pair = open_private_file(&files.private_path, passphrase)?;
        let public = read_public_file(&files.public_path)?;
        if public.public_key != pair.verifying_key_bytes() {
            return Err(StoreError::CorruptKeyFile {
                path: files.public_path.clone(),
                reason: "public key does not match private key".into(),
            });
        }
        Ok(pair)
    }

    /// Fingerprint of the public half of `files`.
    pub fn fingerprint(&self, files: &KeyPairFiles) -> Result<String> {
        Ok(read_public_file(&files.public_path)?.fingerprint())
    }

    /// Fail unless the private key at `private_path` needs a passphrase.
    pub fn ensure_passphrase(&self, private_path: &Path) -> Result<()> {
        match open_private_file(private_path, "") {
            Ok(_) => Err(StoreError::PassphraseRequired(private_path.to_path_buf())),
            Err(StoreError::InvalidPassphrase) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Verify the configured key is still the one recorded.
    ///
    /// Checks, in order: the private file exists and parses, the public
    /// key embedded in it has the recorded fingerprint, the `.pub` file
    /// has the same fingerprint, and the private key is passphrase
    /// protected. No passphrase is needed.
    pub fn verify(&self, recorded: &RecordedKey) -> Result<KeyPairFiles> {
        let private_path = recorded.private_path.clone();
        if !private_path.is_file() {
            return Err(StoreError::KeyFileMissing(private_path));
        }
        let embedded = read_private_file(&private_path)?.public_key_bytes(&private_path)?;
        check_fingerprint(&private_path, &recorded.fingerprint, &fingerprint_of(&embedded))?;

        let public_path = public_path_for(&private_path);
        if !public_path.is_file() {
            return Err(StoreError::KeyFileMissing(public_path));
        }
        let public = read_public_file(&public_path)?.fingerprint();
        check_fingerprint(&public_path, &recorded.fingerprint, &public)?;

        self.ensure_passphrase(&private_path)?;

        let name = private_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(KeyPairFiles {
            name,
            private_path,
            public_path,
        })
    }

    /// Record `files` as the configured key, capturing its fingerprint.
    pub fn record(&self, files: &KeyPairFiles) -> Result<RecordedKey> {
        Ok(RecordedKey {
            private_path: files.private_path.clone(),
            fingerprint: self.fingerprint(files)?,
        })
    }

    fn files_for(&self, name: &str) -> Result<KeyPairFiles> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(StoreError::InvalidName(format!(
                "signing key name '{name}' is not a plain file name"
            )));
        }
        let private_path = self.dir.join(name);
        Ok(KeyPairFiles {
            name: name.to_string(),
            public_path: public_path_for(&private_path),
            private_path,
        })
    }
}

/// `SHA256:` + unpadded base64 of SHA-256(public key).
pub fn fingerprint_of(public_key: &[u8; 32]) -> String {
    let digest = Sha256::digest(public_key);
    format!(
        "SHA256:{}",
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(digest)
    )
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn check_fingerprint(path: &Path, expected: &str, actual: &str) -> Result<()> {
    if actual == expected {
        return Ok(());
    }
    Err(StoreError::FingerprintMismatch {
        path: path.to_path_buf(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

fn public_path_for(private_path: &Path) -> PathBuf {
    let mut name = private_path.as_os_str().to_owned();
    name.push(".");
    name.push(PUBLIC_SUFFIX);
    PathBuf::from(name)
}

fn read_public_file(path: &Path) -> Result<PublicKeyFile> {
    let Some(bytes) = atomic::read_optional(path)? else {
        return Err(StoreError::KeyFileMissing(path.to_path_buf()));
    };
    let text = String::from_utf8(bytes).map_err(|_| StoreError::CorruptKeyFile {
        path: path.to_path_buf(),
        reason: "public key is not UTF-8".into(),
    })?;
    PublicKeyFile::parse(path, &text)
}

pub(crate) fn write_private_file(
    path: &Path,
    pair: &Ed25519KeyPair,
    passphrase: &str,
) -> Result<()> {
    let mut seed = pair.signing_key_bytes();
    let sealed = encryption::encrypt_with_passphrase(passphrase.as_bytes(), &seed);
    seed.zeroize();
    let (salt, nonce, ciphertext) = sealed?;

    let engine = base64::engine::general_purpose::STANDARD;
    let file = PrivateKeyFile {
        version: KEY_VERSION,
        format: KEY_FORMAT.to_string(),
        encryption: EncryptionMetadata {
            algorithm: KEY_ALGORITHM.to_string(),
            kdf: KEY_KDF.to_string(),
            salt: engine.encode(salt),
            nonce: engine.encode(&nonce),
        },
        encrypted_key: engine.encode(&ciphertext),
        public_key: pair.public_key_base64(),
    };
    let json = serde_json::to_vec_pretty(&file)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    atomic::write_atomic(path, &json, Some(OWNER_READ_WRITE))
}

impl PrivateKeyFile {
    /// The plaintext public key stored next to the sealed private key.
    fn public_key_bytes(&self, path: &Path) -> Result<[u8; 32]> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.public_key)
            .ok()
            .and_then(|k| k.try_into().ok())
            .ok_or_else(|| StoreError::CorruptKeyFile {
                path: path.to_path_buf(),
                reason: "embedded public key must be 32 bytes of base64".into(),
            })
    }
}

fn read_private_file(path: &Path) -> Result<PrivateKeyFile> {
    let corrupt = |reason: String| StoreError::CorruptKeyFile {
        path: path.to_path_buf(),
        reason,
    };
    let Some(bytes) = atomic::read_optional(path)? else {
        return Err(StoreError::KeyFileMissing(path.to_path_buf()));
    };
    let file: PrivateKeyFile = serde_json::from_slice(&bytes)
        .map_err(|e| corrupt(format!("unreadable private key: {e}")))?;
    if file.version != KEY_VERSION || file.format != KEY_FORMAT {
        return Err(corrupt(format!(
            "unsupported key file version={} format={}",
            file.version, file.format
        )));
    }
    Ok(file)
}

fn open_private_file(path: &Path, passphrase: &str) -> Result<Ed25519KeyPair> {
    let corrupt = |reason: String| StoreError::CorruptKeyFile {
        path: path.to_path_buf(),
        reason,
    };
    let file = read_private_file(path)?;

    let engine = base64::engine::general_purpose::STANDARD;
    let salt: [u8; 16] = engine
        .decode(&file.encryption.salt)
        .ok()
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| corrupt("salt must be 16 bytes of base64".into()))?;
    let nonce = engine
        .decode(&file.encryption.nonce)
        .map_err(|e| corrupt(format!("invalid nonce base64: {e}")))?;
    let ciphertext = engine
        .decode(&file.encrypted_key)
        .map_err(|e| corrupt(format!("invalid ciphertext base64: {e}")))?;

    let mut seed_vec =
        encryption::decrypt_with_passphrase(passphrase.as_bytes(), &salt, &nonce, &ciphertext)
            .map_err(|e| match e {
                StoreError::InvalidPassphrase => StoreError::InvalidPassphrase,
                other => corrupt(other.to_string()),
            })?;
    let seed: std::result::Result<[u8; 32], _> = seed_vec.as_slice().try_into();
    seed_vec.zeroize();
    let mut seed = seed.map_err(|_| corrupt("private key must be 32 bytes".into()))?;
    let pair = Ed25519KeyPair::from_signing_key_bytes(&seed);
    seed.zeroize();

    if pair.public_key_base64() != file.public_key {
        return Err(corrupt("embedded public key does not match".into()));
    }
    Ok(pair)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
