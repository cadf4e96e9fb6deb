//! # erg-connector — dApp-facing facade over the wallet.
//!
//! Exposes balance queries, UTXO listing and signing of externally built
//! transactions, all speaking the JSON wire format in [`wire`].
//!
//! # Modules
//!
//! - [`error`] — `ConnectorError` enum
//! - [`wire`] — JSON records for boxes and transactions
//! - [`facade`] — `WalletBackend` seam and the `Connector`

pub mod error;
pub mod facade;
pub mod wire;

pub use error::ConnectorError;
pub use facade::{Connector, LocalWallet, NATIVE_TOKEN, WalletBackend};
pub use wire::{WireBox, WireSignedTx, WireUnsignedTx};
