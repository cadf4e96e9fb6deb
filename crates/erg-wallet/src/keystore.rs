//! Password-protected root key container.
//!
//! # File format
//! ```text
//! header_len (4 bytes LE) || header_json || encrypted_payload
//! ```
//! The header is unencrypted JSON with magic, version and the level of the
//! root key. The payload, encrypted with [`crate::encryption`], is the
//! 64-byte wallet seed followed by the root key's path below the master key
//! as little-endian `u32` indices. Unlocking re-derives the root from them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::encryption;
use crate::error::WalletError;
use crate::keys::{ExtendedKey, Seed};

const KEY_FILE_MAGIC: &str = "ERGVKEY";
const KEY_FILE_VERSION: u32 = 2;
const SEED_LEN: usize = 64;

#[derive(Serialize, Deserialize)]
struct KeyFileHeader {
    magic: String,
    version: u32,
    level: u32,
}

/// An encrypted root key, unlocked with the wallet password.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedRootKey {
    level: u32,
    ciphertext: Vec<u8>,
}

impl EncryptedRootKey {
    /// Encrypt the root key at `root_path` below `seed`'s master key.
    pub fn seal(seed: &Seed, root_path: &[u32], password: &[u8]) -> Result<Self, WalletError> {
        let level = u32::try_from(root_path.len())
            .map_err(|_| WalletError::KeyDerivation("root path too long".into()))?;
        let mut plain = Zeroizing::new(Vec::with_capacity(SEED_LEN + 4 * root_path.len()));
        plain.extend_from_slice(seed.as_bytes());
        for index in root_path {
            plain.extend_from_slice(&index.to_le_bytes());
        }
        Ok(Self {
            level,
            ciphertext: encryption::encrypt(&plain, password)?,
        })
    }

    /// Level of the sealed key in the hierarchy.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Decrypt and re-derive the root key.
    pub fn unlock(&self, password: &[u8]) -> Result<ExtendedKey, WalletError> {
        let plain = encryption::decrypt(&self.ciphertext, password)?;
        let (seed_bytes, path_bytes) = plain
            .split_first_chunk::<SEED_LEN>()
            .ok_or_else(|| WalletError::CorruptedData("payload shorter than a seed".into()))?;
        if path_bytes.len() % 4 != 0 {
            return Err(WalletError::CorruptedData("truncated root path".into()));
        }
        let path: Vec<u32> = path_bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if path.len() != self.level as usize {
            return Err(WalletError::CorruptedData(format!(
                "header level {} does not match key level {}",
                self.level,
                path.len()
            )));
        }
        let seed = Seed::from_bytes(*seed_bytes);
        ExtendedKey::master(&seed)?.derive_path(&path)
    }

    /// Serialize to the key file format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WalletError> {
        let header = KeyFileHeader {
            magic: KEY_FILE_MAGIC.to_string(),
            version: KEY_FILE_VERSION,
            level: self.level,
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;
        let header_len = u32::try_from(header_json.len())
            .map_err(|_| WalletError::Serialization("header too large".into()))?;

        let mut out = Vec::with_capacity(4 + header_json.len() + self.ciphertext.len());
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&header_json);
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    /// Parse the key file format.
    pub fn from_bytes(data: &[u8]) -> Result<Self, WalletError> {
        let (len_bytes, rest) = data
            .split_first_chunk::<4>()
            .ok_or_else(|| WalletError::CorruptedData("file too short".into()))?;
        let header_len = u32::from_le_bytes(*len_bytes) as usize;
        if rest.len() < header_len {
            return Err(WalletError::CorruptedData("header truncated".into()));
        }
        let (header_json, ciphertext) = rest.split_at(header_len);
        let header: KeyFileHeader = serde_json::from_slice(header_json)
            .map_err(|e| WalletError::CorruptedData(format!("invalid header: {e}")))?;

        if header.magic != KEY_FILE_MAGIC {
            return Err(WalletError::CorruptedData("invalid magic bytes".into()));
        }
        if header.version != KEY_FILE_VERSION {
            return Err(WalletError::CorruptedData(format!(
                "unsupported version: {}",
                header.version
            )));
        }
        Ok(Self {
            level: header.level,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Write the key file.
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        std::fs::write(path, self.to_bytes()?).map_err(|e| WalletError::IoError(e.to_string()))?;
        debug!(path = %path.display(), level = self.level, "wrote key file");
        Ok(())
    }

    /// Read a key file.
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let data = std::fs::read(path).map_err(|e| WalletError::IoError(e.to_string()))?;
        Self::from_bytes(&data)
    }
}

impl std::fmt::Debug for EncryptedRootKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedRootKey")
            .field("level", &self.level)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::harden;
    use crate::keys::Seed;

    const ACCOUNT_PATH: [u32; 3] = [harden(44), harden(429), harden(0)];

    fn seed() -> Seed {
        Seed::from_bytes([5u8; 64])
    }

    fn sealed_account() -> EncryptedRootKey {
        EncryptedRootKey::seal(&seed(), &ACCOUNT_PATH, b"pw").unwrap()
    }

    #[test]
    fn seal_unlock_roundtrip() {
        let key = ExtendedKey::master(&seed()).unwrap().derive_path(&ACCOUNT_PATH).unwrap();
        let sealed = sealed_account();
        assert_eq!(sealed.level(), 3);
        let unlocked = sealed.unlock(b"pw").unwrap();
        assert_eq!(unlocked.public_key().unwrap(), key.public_key().unwrap());
        assert_eq!(unlocked.level(), key.level());
    }

    #[test]
    fn master_seal_unlocks_at_root() {
        let sealed = EncryptedRootKey::seal(&seed(), &[], b"pw").unwrap();
        let unlocked = sealed.unlock(b"pw").unwrap();
        assert_eq!(unlocked.level(), 0);
        assert_eq!(
            unlocked.public_key().unwrap(),
            ExtendedKey::master(&seed()).unwrap().public_key().unwrap()
        );
    }

    #[test]
    fn short_payload_rejected() {
        let sealed = EncryptedRootKey {
            level: 0,
            ciphertext: encryption::encrypt(&[1u8; 10], b"pw").unwrap(),
        };
        assert!(matches!(
            sealed.unlock(b"pw").unwrap_err(),
            WalletError::CorruptedData(_)
        ));
    }

    #[test]
    fn wrong_password() {
        let sealed = sealed_account();
        assert_eq!(sealed.unlock(b"nope").unwrap_err(), WalletError::InvalidPassword);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.key");
        let sealed = sealed_account();
        sealed.save(&path).unwrap();
        let loaded = EncryptedRootKey::load(&path).unwrap();
        assert_eq!(loaded, sealed);
        assert!(loaded.unlock(b"pw").is_ok());
    }

    #[test]
    fn header_level_mismatch_detected() {
        let mut sealed = sealed_account();
        sealed.level = 0;
        assert!(matches!(
            sealed.unlock(b"pw").unwrap_err(),
            WalletError::CorruptedData(_)
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            EncryptedRootKey::from_bytes(b"ab").unwrap_err(),
            WalletError::CorruptedData(_)
        ));
        assert!(matches!(
            EncryptedRootKey::from_bytes(b"\x05\x00\x00\x00{}").unwrap_err(),
            WalletError::CorruptedData(_)
        ));
        let header = br#"{"magic":"X","version":1,"level":0}"#;
        let mut bad_magic = (header.len() as u32).to_le_bytes().to_vec();
        bad_magic.extend_from_slice(header);
        assert_eq!(
            EncryptedRootKey::from_bytes(&bad_magic).unwrap_err(),
            WalletError::CorruptedData("invalid magic bytes".into())
        );
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EncryptedRootKey::load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, WalletError::IoError(_)));
    }

    #[test]
    fn debug_hides_ciphertext() {
        let sealed = sealed_account();
        assert!(format!("{sealed:?}").contains("ciphertext_len"));
    }
}
