//! Connector error types.

use erg_wallet::WalletError;
use thiserror::Error;

/// Errors returned to connector callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// A wire record is malformed.
    #[error("parse error in {field}: {reason}")]
    Parse {
        /// Wire field that failed.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// An input index does not exist in the transaction.
    #[error("input index {index} out of range for {inputs} inputs")]
    InvalidInputIndex {
        /// Requested index.
        index: usize,
        /// Number of inputs in the transaction.
        inputs: usize,
    },

    /// Internal consistency check failed.
    #[error("assertion failed: {0}")]
    AssertionFailure(String),

    /// Wallet-side failure.
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl ConnectorError {
    pub(crate) fn parse(field: &'static str, reason: impl ToString) -> Self {
        Self::Parse {
            field,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse() {
        let e = ConnectorError::parse("boxId", "odd length");
        assert_eq!(e.to_string(), "parse error in boxId: odd length");
    }

    #[test]
    fn display_invalid_index() {
        let e = ConnectorError::InvalidInputIndex { index: 3, inputs: 2 };
        assert_eq!(e.to_string(), "input index 3 out of range for 2 inputs");
    }

    #[test]
    fn wallet_errors_pass_through() {
        let e: ConnectorError = WalletError::FeeBoxNotFound.into();
        assert_eq!(e.to_string(), "fee box not found");
    }
}
