//! Wallet error types.

use erg_core::error::{AddressError, AssemblyError, CryptoError, ProverError, TransactionError};
use thiserror::Error;

/// Errors that can occur while drafting or signing transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The candidate boxes cannot cover outputs, fee and minimum change.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Value available in nanoERG.
        have: u64,
        /// Value required in nanoERG.
        need: u64,
    },

    /// The candidate boxes do not hold enough of a token the outputs send.
    #[error("insufficient token {token_id}: have {have}, need {need}")]
    InsufficientTokens {
        /// Token id, hex.
        token_id: String,
        /// Amount available.
        have: u64,
        /// Amount required.
        need: u64,
    },

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The assembled transaction does not have the expected output layout.
    #[error("assembly invariant violated: {0}")]
    AssemblyInvariantViolation(String),

    /// No output is owned by the fee address.
    #[error("fee box not found")]
    FeeBoxNotFound,

    /// Addressing inconsistent with the wallet hierarchy.
    #[error("malformed addressing: {0}")]
    MalformedAddressing(String),

    /// Key derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// The request needs something the signer cannot do.
    #[error("unsupported: {0}")]
    UnsupportedFeature(String),

    /// Internal consistency check failed.
    #[error("assertion failed: {0}")]
    AssertionFailure(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// Decryption failure.
    #[error("decryption: {0}")]
    Decryption(String),

    /// Wrong password for encrypted key material.
    #[error("invalid password")]
    InvalidPassword,

    /// Encrypted key material is corrupted or has an invalid format.
    #[error("corrupted key data: {0}")]
    CorruptedData(String),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Filesystem error while reading or writing a key file.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Transaction assembly error from erg-core.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Signing primitive error from erg-core.
    #[error(transparent)]
    Prover(#[from] ProverError),

    /// Transaction model error from erg-core.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Address error from erg-core.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Signature verification error from erg-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let e = WalletError::InsufficientFunds {
            have: 100,
            need: 200,
        };
        assert_eq!(e.to_string(), "insufficient funds: have 100, need 200");
    }

    #[test]
    fn display_insufficient_tokens() {
        let e = WalletError::InsufficientTokens {
            token_id: "ab".into(),
            have: 2,
            need: 3,
        };
        assert_eq!(e.to_string(), "insufficient token ab: have 2, need 3");
    }

    #[test]
    fn display_fee_box_not_found() {
        assert_eq!(WalletError::FeeBoxNotFound.to_string(), "fee box not found");
    }

    #[test]
    fn display_invalid_password() {
        assert_eq!(WalletError::InvalidPassword.to_string(), "invalid password");
    }

    #[test]
    fn clone_and_eq() {
        let e1 = WalletError::MalformedAddressing("level 4".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }

    #[test]
    fn from_assembly_error() {
        let wallet: WalletError = AssemblyError::EmptyInputs.into();
        assert_eq!(wallet, WalletError::Assembly(AssemblyError::EmptyInputs));
    }

    #[test]
    fn from_prover_error() {
        let wallet: WalletError = ProverError::DataInputsUnsupported.into();
        assert_eq!(wallet.to_string(), "data inputs are not supported");
    }
}
