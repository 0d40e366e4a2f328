//! Key management: workspace identity keys and local signing keys.
//!
//! - [`key_file`]: one named identity key per file under `keys/`.
//! - [`manager`]: lookup, first-use creation, and listing of identity keys.
//! - [`keyring`]: passphrase-protected signing keys discovered on disk.

pub mod key_file;
pub mod keyring;
pub mod manager;

pub use key_file::IdentityKey;
pub use keyring::{fingerprint_of, KeyPairFiles, LocalKeyring, PublicKeyFile, RecordedKey};
pub use manager::IdentityManager;
