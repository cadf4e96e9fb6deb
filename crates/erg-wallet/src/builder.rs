//! Transaction drafting.
//!
//! Two policies:
//! 1. [`TransactionDrafter::send_all`] sweeps every supplied UTXO into one
//!    receiver plus the fee box.
//! 2. [`TransactionDrafter::new_tx`] pays explicit outputs, selecting inputs
//!    greedily in supply order until value and tokens are covered, and
//!    returns change to a wallet address.
//!
//! Both delegate box layout to [`TxAssembler`] and then check the layout it
//! produced before trusting it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use erg_core::assembly::TxAssembler;
use erg_core::assets::{merge_assets, TokenTotals};
use erg_core::constants::NetworkType;
use erg_core::types::{
    BoxCandidate, BoxId, ErgoTree, Registers, Token, TxId, UnsignedTransaction, UnspentBox,
};

use crate::addressing::{AddressedUtxo, Addressing};
use crate::coin_selection::{total_value, CoinSelector};
use crate::error::WalletError;

/// Per-invocation protocol parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParams {
    /// Owner script of the miner fee box.
    pub fee_address: ErgoTree,
    /// Smallest value a box may carry.
    pub minimum_box_value: u64,
    /// Network the addresses belong to.
    pub network: NetworkType,
}

/// A requested payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendOutput {
    /// Receiving owner script.
    pub address: ErgoTree,
    /// Value in nanoERG.
    pub amount: u64,
    /// Tokens to send along.
    pub tokens: Vec<Token>,
}

impl SpendOutput {
    /// A plain value payment.
    pub fn new(address: ErgoTree, amount: u64) -> Self {
        Self {
            address,
            amount,
            tokens: Vec::new(),
        }
    }
}

/// Destination of a sweep or of change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    /// Receiving owner script.
    pub address: ErgoTree,
    /// Present when the receiver is one of the wallet's own addresses.
    pub addressing: Option<Addressing>,
}

/// Value routed back to one of the wallet's own addresses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeAddr {
    /// Owner script of the change output.
    pub address: ErgoTree,
    /// Value of the change output in nanoERG.
    pub value: u64,
    /// Where the change key lives.
    pub addressing: Addressing,
}

/// An unsigned transaction plus its change bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    /// The unsigned transaction.
    pub tx: UnsignedTransaction,
    /// Change routed to the wallet, if any.
    pub change_addr: Option<ChangeAddr>,
}

impl TransactionDraft {
    /// Id the transaction will have once signed.
    pub fn id(&self) -> Result<TxId, WalletError> {
        Ok(self.tx.id()?)
    }

    /// Output boxes with their final ids.
    pub fn outputs(&self) -> Result<Vec<UnspentBox>, WalletError> {
        Ok(self.tx.outputs()?)
    }
}

/// A draft together with the UTXOs it consumes, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drafted {
    /// The draft.
    pub draft: TransactionDraft,
    /// Addressed UTXOs consumed by the draft's inputs.
    pub sender_utxos: Vec<AddressedUtxo>,
}

/// Builds transaction drafts for one set of protocol parameters.
#[derive(Debug, Clone)]
pub struct TransactionDrafter {
    params: ProtocolParams,
    current_height: u32,
}

impl TransactionDrafter {
    /// Drafter creating outputs at `current_height`.
    pub fn new(params: ProtocolParams, current_height: u32) -> Self {
        Self {
            params,
            current_height,
        }
    }

    /// Protocol parameters in use.
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Spend every UTXO, sending everything except `fee` to `receiver`.
    ///
    /// Outputs are `[remainder, fee]`; the remainder carries every input
    /// token. Change is recorded only when the receiver has an addressing.
    pub fn send_all(
        &self,
        receiver: &Receiver,
        utxos: &[AddressedUtxo],
        fee: u64,
    ) -> Result<Drafted, WalletError> {
        validate_fee(fee)?;
        let input_sum = total_value(utxos)?;
        let need = checked_sum(&[fee, self.params.minimum_box_value])?;
        if utxos.is_empty() || input_sum < need {
            return Err(WalletError::InsufficientFunds {
                have: input_sum,
                need,
            });
        }

        let boxes = unspent_boxes(utxos)?;
        let remainder = input_sum - fee;
        let outputs = vec![
            BoxCandidate {
                value: remainder,
                ergo_tree: receiver.address.clone(),
                creation_height: self.current_height,
                assets: merge_assets(boxes.iter().map(|b| b.assets.as_slice()))?,
                additional_registers: Registers::new(),
            },
            self.fee_box(fee),
        ];

        let tx = TxAssembler::new(
            &boxes,
            outputs,
            self.current_height,
            self.params.minimum_box_value,
        )
        .build()?;
        if tx.output_candidates.len() != 2 {
            return Err(WalletError::AssemblyInvariantViolation(format!(
                "sweep expected 2 outputs, assembler produced {}",
                tx.output_candidates.len()
            )));
        }

        let change_addr = receiver.addressing.clone().map(|addressing| ChangeAddr {
            address: receiver.address.clone(),
            value: remainder,
            addressing,
        });
        let sender_utxos = correlate(&tx, utxos)?;

        debug!(
            inputs = tx.inputs.len(),
            remainder,
            fee,
            own_receiver = change_addr.is_some(),
            "drafted sweep"
        );
        Ok(Drafted {
            draft: TransactionDraft { tx, change_addr },
            sender_utxos,
        })
    }

    /// Pay `outputs`, selecting inputs from `utxos` in supply order and
    /// returning change to `change`.
    ///
    /// Outputs are `[outputs..., fee, change]`. `change` must carry an
    /// addressing.
    pub fn new_tx(
        &self,
        outputs: &[SpendOutput],
        change: &Receiver,
        utxos: &[AddressedUtxo],
        fee: u64,
    ) -> Result<Drafted, WalletError> {
        let change_addressing = change.addressing.clone().ok_or_else(|| {
            WalletError::MalformedAddressing("change receiver has no addressing".into())
        })?;
        validate_fee(fee)?;
        for (i, out) in outputs.iter().enumerate() {
            self.validate_output(i, out)?;
        }

        let explicit_sum = checked_sum(&outputs.iter().map(|o| o.amount).collect::<Vec<_>>())?;
        let required = checked_sum(&[explicit_sum, fee, self.params.minimum_box_value])?;
        let mut required_tokens = TokenTotals::new();
        for out in outputs {
            required_tokens.add_all(&out.tokens)?;
        }
        let selection = CoinSelector::select(utxos, required, &required_tokens)?;
        let boxes = unspent_boxes(&selection.selected)?;

        let mut candidates: Vec<BoxCandidate> = outputs
            .iter()
            .map(|o| BoxCandidate {
                value: o.amount,
                ergo_tree: o.address.clone(),
                creation_height: self.current_height,
                assets: o.tokens.clone(),
                additional_registers: Registers::new(),
            })
            .collect();
        candidates.push(self.fee_box(fee));

        let mut tx = TxAssembler::new(
            &boxes,
            candidates,
            self.current_height,
            self.params.minimum_box_value,
        )
        .build()?;

        let explicit = outputs.len();
        self.check_layout(&tx, explicit, fee)?;

        let change_box = &mut tx.output_candidates[explicit + 1];
        change_box.ergo_tree = change.address.clone();
        let change_addr = ChangeAddr {
            address: change.address.clone(),
            value: change_box.value,
            addressing: change_addressing,
        };
        let sender_utxos = correlate(&tx, &selection.selected)?;

        debug!(
            inputs = tx.inputs.len(),
            outputs = explicit,
            fee,
            change = change_addr.value,
            "drafted transaction"
        );
        Ok(Drafted {
            draft: TransactionDraft {
                tx,
                change_addr: Some(change_addr),
            },
            sender_utxos,
        })
    }

    fn fee_box(&self, fee: u64) -> BoxCandidate {
        BoxCandidate::simple(fee, self.params.fee_address.clone(), self.current_height)
    }

    fn validate_output(&self, index: usize, out: &SpendOutput) -> Result<(), WalletError> {
        if out.amount == 0 || out.amount < self.params.minimum_box_value {
            return Err(WalletError::InvalidAmount(format!(
                "output {index}: {} is below the minimum box value {}",
                out.amount, self.params.minimum_box_value
            )));
        }
        if let Some(t) = out.tokens.iter().find(|t| t.amount == 0) {
            return Err(WalletError::InvalidAmount(format!(
                "output {index}: zero amount of token {}",
                t.token_id
            )));
        }
        erg_core::types::validate_assets(&out.tokens)?;
        Ok(())
    }

    /// The assembler must yield `[explicit..., fee, change]`.
    fn check_layout(
        &self,
        tx: &UnsignedTransaction,
        explicit: usize,
        fee: u64,
    ) -> Result<(), WalletError> {
        let outputs = &tx.output_candidates;
        if outputs.len() != explicit + 2 {
            return Err(WalletError::AssemblyInvariantViolation(format!(
                "expected {} outputs (explicit, fee, change), assembler produced {}",
                explicit + 2,
                outputs.len()
            )));
        }
        let fee_box = &outputs[explicit];
        if fee_box.ergo_tree != self.params.fee_address || fee_box.value != fee {
            return Err(WalletError::AssemblyInvariantViolation(format!(
                "fee box not at output {explicit}"
            )));
        }
        Ok(())
    }
}

fn validate_fee(fee: u64) -> Result<(), WalletError> {
    if fee == 0 {
        return Err(WalletError::InvalidAmount("fee must be non-zero".into()));
    }
    Ok(())
}

fn checked_sum(values: &[u64]) -> Result<u64, WalletError> {
    values.iter().try_fold(0u64, |acc, v| {
        acc.checked_add(*v)
            .ok_or_else(|| WalletError::InvalidAmount("amount sum overflows u64".into()))
    })
}

fn unspent_boxes(utxos: &[AddressedUtxo]) -> Result<Vec<UnspentBox>, WalletError> {
    utxos
        .iter()
        .map(|u| {
            u.utxo.validate()?;
            Ok(u.utxo.clone())
        })
        .collect()
}

/// Map each input of `tx` back to its addressed UTXO.
fn correlate(
    tx: &UnsignedTransaction,
    utxos: &[AddressedUtxo],
) -> Result<Vec<AddressedUtxo>, WalletError> {
    let index: HashMap<BoxId, &AddressedUtxo> =
        utxos.iter().map(|u| (u.utxo.box_id, u)).collect();
    tx.inputs
        .iter()
        .map(|input| {
            index.get(&input.box_id).map(|u| (*u).clone()).ok_or_else(|| {
                WalletError::AssertionFailure(format!(
                    "input {} has no addressed UTXO",
                    input.box_id
                ))
            })
        })
        .collect()
}
