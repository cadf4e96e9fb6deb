//! Multi-asset aggregation.
//!
//! Token totals keep the order in which each token id was first seen, so any
//! output restating a merged set lists tokens in a stable, input-driven order.

use std::collections::HashMap;

use crate::error::TransactionError;
use crate::types::{Token, TokenId};

/// Ordered per-token totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTotals {
    order: Vec<TokenId>,
    amounts: HashMap<TokenId, u64>,
}

impl TokenTotals {
    /// Empty totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` of `token_id`.
    pub fn add(&mut self, token_id: TokenId, amount: u64) -> Result<(), TransactionError> {
        match self.amounts.get_mut(&token_id) {
            Some(total) => {
                *total = total.checked_add(amount).ok_or(TransactionError::ValueOverflow)?;
            }
            None => {
                self.order.push(token_id);
                self.amounts.insert(token_id, amount);
            }
        }
        Ok(())
    }

    /// Add every token in `tokens`.
    pub fn add_all<'a>(
        &mut self,
        tokens: impl IntoIterator<Item = &'a Token>,
    ) -> Result<(), TransactionError> {
        for token in tokens {
            self.add(token.token_id, token.amount)?;
        }
        Ok(())
    }

    /// Total held of `token_id`.
    pub fn get(&self, token_id: &TokenId) -> u64 {
        self.amounts.get(token_id).copied().unwrap_or(0)
    }

    /// Token ids in first-seen order.
    pub fn token_ids(&self) -> &[TokenId] {
        &self.order
    }

    /// Whether no token has been recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Subtract `other` from these totals.
    ///
    /// Returns the token whose balance would go negative as
    /// `Err((token_id, have, need))`. Tokens whose remainder is zero are dropped.
    pub fn checked_sub(&self, other: &TokenTotals) -> Result<TokenTotals, (TokenId, u64, u64)> {
        for id in other.token_ids() {
            let have = self.get(id);
            let need = other.get(id);
            if need > have {
                return Err((*id, have, need));
            }
        }
        let mut out = TokenTotals::new();
        for id in &self.order {
            let left = self.get(id) - other.get(id);
            if left > 0 {
                out.order.push(*id);
                out.amounts.insert(*id, left);
            }
        }
        Ok(out)
    }

    /// Materialize as a token list, dropping zero totals.
    pub fn to_tokens(&self) -> Vec<Token> {
        self.order
            .iter()
            .filter_map(|id| {
                let amount = self.get(id);
                (amount > 0).then_some(Token {
                    token_id: *id,
                    amount,
                })
            })
            .collect()
    }
}

/// Merge the token lists of several boxes, summing per token id.
pub fn merge_assets<'a>(
    lists: impl IntoIterator<Item = &'a [Token]>,
) -> Result<Vec<Token>, TransactionError> {
    let mut totals = TokenTotals::new();
    for list in lists {
        totals.add_all(list)?;
    }
    Ok(totals.to_tokens())
}
