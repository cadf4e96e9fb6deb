//! # erg-wallet — transaction drafting and signing over an HD key tree.
//!
//! Selects inputs, drafts unsigned transactions with change and fee, wraps
//! them in sign requests with display summaries, and signs them with keys
//! derived from a password-protected root key.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`addressing`] — BIP-44 levels and derivation paths of boxes
//! - [`keys`] — Seed, ExtendedKey, per-signing KeySet
//! - [`mnemonic`] — BIP-39 phrase generation and restoration
//! - [`encryption`] — AES-256-GCM with an Argon2id password KDF
//! - [`keystore`] — Encrypted root key file
//! - [`coin_selection`] — In-order greedy UTXO selection
//! - [`builder`] — Sweep and targeted transaction drafting
//! - [`sign_request`] — Derived financial summaries of a draft
//! - [`signer`] — Signing session state machine and signer

pub mod addressing;
pub mod builder;
pub mod coin_selection;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod mnemonic;
pub mod sign_request;
pub mod signer;

// Re-exports for convenient access
pub use addressing::{AddressedUtxo, Addressing};
pub use builder::{
    ChangeAddr, Drafted, ProtocolParams, Receiver, SpendOutput, TransactionDraft,
    TransactionDrafter,
};
pub use coin_selection::{CoinSelection, CoinSelector};
pub use encryption::{decrypt, encrypt};
pub use error::WalletError;
pub use keys::{ExtendedKey, KeySet, Seed};
pub use keystore::EncryptedRootKey;
pub use sign_request::{Amount, SignRequest, SignRequestSummary};
pub use signer::{SignedTx, Signer, SigningSession, SigningState};
