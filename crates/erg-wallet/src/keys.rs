//! Hierarchical deterministic key derivation.
//!
//! Keys form the BIP-32 tree Ergo wallets use: ergo-lib's [`ExtSecretKey`]
//! derives the master key from a 64-byte seed with HMAC-SHA512 keyed by
//! `"Bitcoin seed"` and walks secp256k1 children from there. Indices at or
//! above [`HARDENED`] are hardened children.
//!
//! A key that only holds a public key cannot derive children here.

use std::collections::HashSet;
use std::fmt;

use ergo_lib::wallet::derivation_path::{ChildIndex, ChildIndexHardened, ChildIndexNormal};
use ergo_lib::wallet::ext_secret_key::ExtSecretKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use erg_core::constants::HARDENED;
use erg_core::crypto::{KeyPair, PublicKey};

use crate::addressing::{level, AddressedUtxo, Addressing};
use crate::error::WalletError;

/// A 64-byte BIP-39 seed.
///
/// Secret material is zeroized on drop to prevent leaking key material
/// in freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 64],
}

impl Seed {
    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
enum KeyMaterial {
    Private(ExtSecretKey),
    Public(PublicKey),
}

/// A node of the key tree and its depth.
#[derive(Clone)]
pub struct ExtendedKey {
    material: KeyMaterial,
    level: u32,
}

/// The ergo-lib child index for a raw BIP-32 index.
fn child_index(index: u32) -> Result<ChildIndex, WalletError> {
    let converted = if index >= HARDENED {
        ChildIndexHardened::from_31_bit(index & !HARDENED).map(ChildIndex::Hardened)
    } else {
        ChildIndexNormal::normal(index).map(ChildIndex::Normal)
    };
    converted.map_err(|e| WalletError::KeyDerivation(format!("child index {index}: {e}")))
}

/// Level of the first child below a key at `key_level`.
fn first_level_below(key_level: u32) -> Result<u32, WalletError> {
    key_level
        .checked_add(1)
        .ok_or_else(|| WalletError::KeyDerivation(format!("no level below {key_level}")))
}

impl ExtendedKey {
    /// The master (root level) key for a seed.
    pub fn master(seed: &Seed) -> Result<Self, WalletError> {
        let ext = ExtSecretKey::derive_master(*seed.as_bytes())
            .map_err(|e| WalletError::KeyDerivation(format!("master key: {e}")))?;
        Ok(Self {
            material: KeyMaterial::Private(ext),
            level: level::ROOT,
        })
    }

    /// A public-only key at `level`. It can identify addresses but not sign.
    pub fn from_public(public_key: PublicKey, level: u32) -> Self {
        Self {
            material: KeyMaterial::Public(public_key),
            level,
        }
    }

    /// Drop the secret, keeping the public half.
    pub fn to_public(&self) -> Result<Self, WalletError> {
        Ok(Self::from_public(self.public_key()?, self.level))
    }

    /// Depth of this key in the hierarchy.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Whether this key can sign and derive children.
    pub fn is_private(&self) -> bool {
        matches!(self.material, KeyMaterial::Private(_))
    }

    /// The public key of this node.
    pub fn public_key(&self) -> Result<PublicKey, WalletError> {
        match &self.material {
            KeyMaterial::Private(ext) => Ok(PublicKey::from_image(ext.public_image())?),
            KeyMaterial::Public(pk) => Ok(pk.clone()),
        }
    }

    /// The signing key of this node.
    pub fn key_pair(&self) -> Result<KeyPair, WalletError> {
        match &self.material {
            KeyMaterial::Private(ext) => Ok(KeyPair::from_secret_key(ext.secret_key())?),
            KeyMaterial::Public(_) => Err(WalletError::KeyDerivation(format!(
                "key at level {} holds no private key",
                self.level
            ))),
        }
    }

    /// Derive the child at `index`.
    pub fn derive_child(&self, index: u32) -> Result<Self, WalletError> {
        let KeyMaterial::Private(ext) = &self.material else {
            return Err(WalletError::KeyDerivation(format!(
                "cannot derive private child {index} from public key at level {}",
                self.level
            )));
        };
        let level = first_level_below(self.level)?;
        let child = ext
            .child(child_index(index)?)
            .map_err(|e| WalletError::KeyDerivation(format!("child {index}: {e}")))?;
        Ok(Self {
            material: KeyMaterial::Private(child),
            level,
        })
    }

    /// Walk `path` below this key.
    pub fn derive_path(&self, path: &[u32]) -> Result<Self, WalletError> {
        path.iter()
            .try_fold(self.clone(), |key, index| key.derive_child(*index))
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("level", &self.level)
            .field("public_key", &self.public_key().ok())
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}

/// Derive the signing key for a box's addressing from `root`.
///
/// The path entries at or above `root`'s level are skipped; the remainder is
/// walked below `root`. The addressing must end at the address level.
pub fn derive_for_addressing(root: &ExtendedKey, addressing: &Addressing) -> Result<KeyPair, WalletError> {
    addressing.require_address_level()?;

    let first_needed = first_level_below(root.level())?;
    if first_needed < addressing.start_level {
        return Err(WalletError::KeyDerivation(format!(
            "path {addressing} starts at level {} but key is at level {}",
            addressing.start_level,
            root.level()
        )));
    }
    let skip = (first_needed - addressing.start_level) as usize;
    if skip > addressing.path.len() {
        return Err(WalletError::KeyDerivation(format!(
            "key at level {} is below the end of path {addressing}",
            root.level()
        )));
    }
    root.derive_path(&addressing.path[skip..])?.key_pair()
}

/// Private keys for one signing operation, one per distinct public key.
///
/// Never persisted.
pub struct KeySet {
    keys: Vec<KeyPair>,
}

impl KeySet {
    /// Derive the keys spending `senders`.
    ///
    /// Boxes sharing an addressing are derived once, and keys are
    /// deduplicated by public key.
    pub fn derive(senders: &[AddressedUtxo], root: &ExtendedKey) -> Result<Self, WalletError> {
        let mut seen_paths: HashSet<&Addressing> = HashSet::new();
        let mut seen_keys: HashSet<PublicKey> = HashSet::new();
        let mut keys = Vec::new();
        for sender in senders {
            sender.addressing.require_address_level()?;
            if !seen_paths.insert(&sender.addressing) {
                continue;
            }
            let kp = derive_for_addressing(root, &sender.addressing)?;
            if seen_keys.insert(kp.public_key()) {
                keys.push(kp);
            }
        }
        Ok(Self { keys })
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The keys, for handing to a prover.
    pub fn as_slice(&self) -> &[KeyPair] {
        &self.keys
    }

    /// Public halves of the keys, in derivation order.
    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(KeyPair::public_key).collect()
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet")
            .field("keys", &self.keys.len())
            .finish()
    }
}
