//! BIP-44 addressing: where in the key hierarchy a box's key lives.
//!
//! An [`Addressing`] names a starting level and the child indices below it.
//! For a wallet address the path ends at [`level::ADDRESS`]:
//! `m / 44' / 429' / account' / chain / index`.

use serde::{Deserialize, Serialize};
use std::fmt;

use erg_core::constants::{ERGO_COIN_TYPE, HARDENED};
use erg_core::types::UnspentBox;

use crate::error::WalletError;

/// Levels of the BIP-44 hierarchy.
pub mod level {
    /// The master key.
    pub const ROOT: u32 = 0;
    /// `44'`.
    pub const PURPOSE: u32 = 1;
    /// `429'` for Ergo.
    pub const COIN_TYPE: u32 = 2;
    /// Account index (hardened).
    pub const ACCOUNT: u32 = 3;
    /// External (0) or internal/change (1) chain.
    pub const CHAIN: u32 = 4;
    /// Address index.
    pub const ADDRESS: u32 = 5;
}

/// BIP-44 purpose index.
pub const BIP44_PURPOSE: u32 = 44;

/// Mark `index` as hardened.
pub const fn harden(index: u32) -> u32 {
    index | HARDENED
}

/// Derivation path of a key, relative to a starting level.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Addressing {
    /// Level of the first path entry.
    pub start_level: u32,
    /// Child indices, one per level.
    pub path: Vec<u32>,
}

impl Addressing {
    /// Addressing of a wallet address, starting at the purpose level.
    pub fn bip44(account: u32, chain: u32, index: u32) -> Self {
        Self {
            start_level: level::PURPOSE,
            path: vec![
                harden(BIP44_PURPOSE),
                harden(ERGO_COIN_TYPE),
                harden(account),
                chain,
                index,
            ],
        }
    }

    /// Level of the last path entry (`start_level - 1` for an empty path).
    pub fn end_level(&self) -> i64 {
        self.start_level as i64 + self.path.len() as i64 - 1
    }

    /// Fail unless the path ends at the address level.
    pub fn require_address_level(&self) -> Result<(), WalletError> {
        if self.end_level() != level::ADDRESS as i64 {
            return Err(WalletError::MalformedAddressing(format!(
                "path {self} ends at level {}, expected {}",
                self.end_level(),
                level::ADDRESS
            )));
        }
        Ok(())
    }

    /// Parse `44'/429'/0'/0/3` (an optional leading `m/` is ignored).
    ///
    /// Hardened indices are marked with `'` or `h`.
    pub fn parse(path: &str, start_level: u32) -> Result<Self, WalletError> {
        let trimmed = path.trim().trim_start_matches("m/");
        let mut indices = Vec::new();
        for part in trimmed.split('/').filter(|p| !p.is_empty()) {
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
                Some(d) => (d, true),
                None => (part, false),
            };
            let index: u32 = digits.parse().map_err(|_| {
                WalletError::MalformedAddressing(format!("invalid path segment: {part}"))
            })?;
            if index >= HARDENED {
                return Err(WalletError::MalformedAddressing(format!(
                    "index out of range: {part}"
                )));
            }
            indices.push(if hardened { harden(index) } else { index });
        }
        Ok(Self {
            start_level,
            path: indices,
        })
    }
}

impl fmt::Display for Addressing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.path {
            if index & HARDENED != 0 {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{index}")?;
            }
        }
        Ok(())
    }
}

/// An unspent box together with the addressing of the key that spends it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressedUtxo {
    /// The box.
    #[serde(flatten)]
    pub utxo: UnspentBox,
    /// Where its key lives.
    pub addressing: Addressing,
}
