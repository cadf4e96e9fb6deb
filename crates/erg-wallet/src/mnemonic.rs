//! BIP-39 mnemonic generation and restoration.
//!
//! Phrases are generated and checked with `bip39`; the seed is stretched by
//! ergo-lib's [`ErgoMnemonic::to_seed`], the same PBKDF2 the reference
//! wallets use.

use bip39::{Language, Mnemonic};
use ergo_lib::wallet::mnemonic::Mnemonic as ErgoMnemonic;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::{ExtendedKey, Seed};

/// Word count of newly generated Ergo wallets.
pub const DEFAULT_WORD_COUNT: usize = 15;

/// Generate a fresh English mnemonic of `word_count` words.
///
/// Valid counts are 12, 15, 18, 21 and 24.
pub fn generate_mnemonic(word_count: usize) -> Result<String, WalletError> {
    if !matches!(word_count, 12 | 15 | 18 | 21 | 24) {
        return Err(WalletError::InvalidMnemonic(format!(
            "unsupported word count: {word_count}"
        )));
    }
    // 11 bits per word, one checksum bit per 32 bits of entropy.
    let entropy_len = word_count * 11 * 32 / 33 / 8;
    let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let m = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(m.to_string())
}

/// Parse a BIP-39 mnemonic phrase and stretch it into a 64-byte seed.
///
/// Normalizes whitespace and converts to lowercase before parsing. The
/// passphrase may be empty.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Seed, WalletError> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    );
    Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(Seed::from_bytes(ErgoMnemonic::to_seed(
        normalized.as_str(),
        passphrase,
    )))
}

/// Root key of the wallet restored from `phrase`.
pub fn root_key_from_mnemonic(phrase: &str, passphrase: &str) -> Result<ExtendedKey, WalletError> {
    let seed = mnemonic_to_seed(phrase, passphrase)?;
    ExtendedKey::master(&seed)
}
