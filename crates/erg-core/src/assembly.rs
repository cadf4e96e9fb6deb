//! Transaction assembly.
//!
//! [`TxAssembler`] turns a fixed set of input boxes and output candidates into
//! an [`UnsignedTransaction`], appending a single change box for any value or
//! tokens the outputs leave behind. The change box is placed after every
//! supplied candidate and is owned by the first input's owner script; callers
//! that want change elsewhere rewrite the owner afterwards.

use tracing::debug;

use crate::assets::TokenTotals;
use crate::error::{AssemblyError, TransactionError};
use crate::types::{BoxCandidate, Registers, UnsignedInput, UnsignedTransaction, UnspentBox};

/// Assembles unsigned transactions from an already chosen input set.
#[derive(Debug, Clone)]
pub struct TxAssembler<'a> {
    inputs: &'a [UnspentBox],
    outputs: Vec<BoxCandidate>,
    current_height: u32,
    min_change_value: u64,
}

impl<'a> TxAssembler<'a> {
    /// Create an assembler over `inputs` producing `outputs` plus change.
    pub fn new(
        inputs: &'a [UnspentBox],
        outputs: Vec<BoxCandidate>,
        current_height: u32,
        min_change_value: u64,
    ) -> Self {
        Self {
            inputs,
            outputs,
            current_height,
            min_change_value,
        }
    }

    /// Build the unsigned transaction.
    ///
    /// Fails when the inputs cannot cover the outputs in value or in any
    /// token, or when leftover value is too small for a change box.
    pub fn build(self) -> Result<UnsignedTransaction, AssemblyError> {
        let first = self.inputs.first().ok_or(AssemblyError::EmptyInputs)?;

        let input_value = sum_values(self.inputs.iter().map(|b| b.value))?;
        let output_value = sum_values(self.outputs.iter().map(|c| c.value))?;
        if output_value > input_value {
            return Err(AssemblyError::NotEnoughCoins {
                have: input_value,
                need: output_value,
            });
        }

        let mut input_tokens = TokenTotals::new();
        for b in self.inputs {
            input_tokens.add_all(&b.assets)?;
        }
        let mut output_tokens = TokenTotals::new();
        for c in &self.outputs {
            output_tokens.add_all(&c.assets)?;
        }
        let leftover_tokens = input_tokens.checked_sub(&output_tokens).map_err(
            |(token_id, have, need)| AssemblyError::NotEnoughTokens {
                token_id: token_id.to_string(),
                have,
                need,
            },
        )?;

        let change_value = input_value - output_value;
        let mut outputs = self.outputs;
        if change_value > 0 || !leftover_tokens.is_empty() {
            if change_value < self.min_change_value {
                return Err(AssemblyError::ChangeBelowMinimum {
                    change: change_value,
                    min: self.min_change_value,
                });
            }
            debug!(
                change_value,
                tokens = leftover_tokens.token_ids().len(),
                "appending change box"
            );
            outputs.push(BoxCandidate {
                value: change_value,
                ergo_tree: first.ergo_tree.clone(),
                creation_height: self.current_height,
                assets: leftover_tokens.to_tokens(),
                additional_registers: Registers::new(),
            });
        }

        Ok(UnsignedTransaction {
            inputs: self
                .inputs
                .iter()
                .map(|b| UnsignedInput::new(b.box_id))
                .collect(),
            data_inputs: Vec::new(),
            output_candidates: outputs,
        })
    }
}

fn sum_values(mut values: impl Iterator<Item = u64>) -> Result<u64, TransactionError> {
    values.try_fold(0u64, |acc, v| acc.checked_add(v).ok_or(TransactionError::ValueOverflow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::{ErgoTree, Hash256, Token};

    fn tree(b: u8) -> ErgoTree {
        KeyPair::from_secret_bytes([b; 32]).unwrap().public_key().p2pk_tree()
    }

    fn input(id: u8, value: u64, assets: Vec<Token>) -> UnspentBox {
        UnspentBox {
            box_id: Hash256([id; 32]),
            value,
            ergo_tree: tree(id),
            creation_height: 1,
            assets,
            additional_registers: Registers::new(),
            transaction_id: Hash256([0xEE; 32]),
            index: 0,
        }
    }

    fn tok(b: u8, amount: u64) -> Token {
        Token {
            token_id: Hash256([b; 32]),
            amount,
        }
    }

    #[test]
    fn change_appended_last_and_owned_by_first_input() {
        let inputs = vec![input(1, 5_000_000, vec![]), input(2, 5_000_000, vec![])];
        let outputs = vec![BoxCandidate::simple(3_000_000, tree(0xAA), 100)];
        let tx = TxAssembler::new(&inputs, outputs, 100, 1_000_000).build().unwrap();

        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.output_candidates.len(), 2);
        let change = &tx.output_candidates[1];
        assert_eq!(change.value, 7_000_000);
        assert_eq!(change.ergo_tree, tree(1));
        assert_eq!(change.creation_height, 100);
    }

    #[test]
    fn leftover_tokens_go_to_change() {
        let inputs = vec![input(1, 5_000_000, vec![tok(9, 100), tok(8, 1)])];
        let mut out = BoxCandidate::simple(2_000_000, tree(0xAA), 100);
        out.assets = vec![tok(9, 40)];
        let tx = TxAssembler::new(&inputs, vec![out], 100, 1_000_000).build().unwrap();
        assert_eq!(tx.output_candidates[1].assets, vec![tok(9, 60), tok(8, 1)]);
    }

    #[test]
    fn exact_spend_has_no_change() {
        let inputs = vec![input(1, 2_000_000, vec![])];
        let outputs = vec![BoxCandidate::simple(2_000_000, tree(0xAA), 100)];
        let tx = TxAssembler::new(&inputs, outputs, 100, 1_000_000).build().unwrap();
        assert_eq!(tx.output_candidates.len(), 1);
    }

    #[test]
    fn empty_inputs_rejected() {
        let err = TxAssembler::new(&[], vec![], 1, 0).build().unwrap_err();
        assert_eq!(err, AssemblyError::EmptyInputs);
    }

    #[test]
    fn overspend_rejected() {
        let inputs = vec![input(1, 1_000, vec![])];
        let outputs = vec![BoxCandidate::simple(2_000, tree(0xAA), 1)];
        let err = TxAssembler::new(&inputs, outputs, 1, 0).build().unwrap_err();
        assert_eq!(err, AssemblyError::NotEnoughCoins { have: 1_000, need: 2_000 });
    }

    #[test]
    fn token_overspend_rejected() {
        let inputs = vec![input(1, 5_000_000, vec![tok(9, 1)])];
        let mut out = BoxCandidate::simple(1_000_000, tree(0xAA), 1);
        out.assets = vec![tok(9, 2)];
        let err = TxAssembler::new(&inputs, vec![out], 1, 0).build().unwrap_err();
        assert!(matches!(err, AssemblyError::NotEnoughTokens { have: 1, need: 2, .. }));
    }

    #[test]
    fn dust_change_rejected() {
        let inputs = vec![input(1, 2_000_500, vec![])];
        let outputs = vec![BoxCandidate::simple(2_000_000, tree(0xAA), 1)];
        let err = TxAssembler::new(&inputs, outputs, 1, 1_000_000).build().unwrap_err();
        assert_eq!(err, AssemblyError::ChangeBelowMinimum { change: 500, min: 1_000_000 });
    }

    #[test]
    fn tokens_without_value_still_need_change_box() {
        let inputs = vec![input(1, 2_000_000, vec![tok(9, 1)])];
        let outputs = vec![BoxCandidate::simple(2_000_000, tree(0xAA), 1)];
        let err = TxAssembler::new(&inputs, outputs, 1, 1_000_000).build().unwrap_err();
        assert_eq!(err, AssemblyError::ChangeBelowMinimum { change: 0, min: 1_000_000 });
    }

    #[test]
    fn input_value_overflow_reported() {
        let inputs = vec![input(1, u64::MAX, vec![]), input(2, 1, vec![])];
        let outputs = vec![BoxCandidate::simple(1_000_000, tree(0xAA), 1)];
        let err = TxAssembler::new(&inputs, outputs, 1, 0).build().unwrap_err();
        assert_eq!(err, AssemblyError::Transaction(TransactionError::ValueOverflow));
    }
}
