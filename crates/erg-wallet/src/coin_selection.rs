//! In-order greedy coin selection.
//!
//! UTXOs are taken in the order the caller supplies them until their value
//! covers the target and their tokens cover every required token amount. No
//! sorting is applied, so the caller controls which boxes are spent first.

use tracing::debug;

use erg_core::assets::TokenTotals;

use crate::addressing::AddressedUtxo;
use crate::error::WalletError;

/// Result of coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected UTXOs, in supply order.
    pub selected: Vec<AddressedUtxo>,
    /// Total value of the selected UTXOs in nanoERG.
    pub input_sum: u64,
}

/// Greedy, order-preserving coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select a prefix of `utxos` holding at least `required` nanoERG and at
    /// least the amount of every token in `required_tokens`.
    ///
    /// Fails with [`WalletError::InsufficientFunds`] when the whole list does
    /// not reach `required` or when nothing was selected, and with
    /// [`WalletError::InsufficientTokens`] when value suffices but a token
    /// does not.
    pub fn select(
        utxos: &[AddressedUtxo],
        required: u64,
        required_tokens: &TokenTotals,
    ) -> Result<CoinSelection, WalletError> {
        let mut selected = Vec::new();
        let mut input_sum: u64 = 0;
        let mut held = TokenTotals::new();

        for utxo in utxos {
            if !selected.is_empty() && input_sum >= required && covers(&held, required_tokens) {
                break;
            }
            input_sum = input_sum.checked_add(utxo.utxo.value).ok_or_else(|| {
                WalletError::InvalidAmount("UTXO value sum overflows u64".into())
            })?;
            held.add_all(&utxo.utxo.assets)?;
            selected.push(utxo.clone());
        }

        if selected.is_empty() || input_sum < required {
            return Err(WalletError::InsufficientFunds {
                have: input_sum,
                need: required,
            });
        }
        if let Err((token_id, have, need)) = held.checked_sub(required_tokens) {
            return Err(WalletError::InsufficientTokens {
                token_id: token_id.to_string(),
                have,
                need,
            });
        }

        debug!(
            selected = selected.len(),
            available = utxos.len(),
            input_sum,
            required,
            tokens = required_tokens.token_ids().len(),
            "coin selection complete"
        );
        Ok(CoinSelection {
            selected,
            input_sum,
        })
    }
}

fn covers(held: &TokenTotals, required: &TokenTotals) -> bool {
    required
        .token_ids()
        .iter()
        .all(|id| held.get(id) >= required.get(id))
}

/// Sum of the values of `utxos`, failing on overflow.
pub fn total_value(utxos: &[AddressedUtxo]) -> Result<u64, WalletError> {
    utxos.iter().try_fold(0u64, |acc, u| {
        acc.checked_add(u.utxo.value)
            .ok_or_else(|| WalletError::InvalidAmount("UTXO value sum overflows u64".into()))
    })
}
