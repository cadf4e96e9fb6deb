//! Read-only view over a drafted transaction.
//!
//! A [`SignRequest`] bundles a draft, the UTXOs it consumes and the protocol
//! parameters it was built with. Every query is a pure function of those
//! three fields.

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};

use erg_core::address::Address;
use erg_core::assets::merge_assets;
use erg_core::constants::ERG_DECIMALS;
use erg_core::types::{BoxCandidate, BoxId, ErgoTree, Token, TxId};

use crate::addressing::AddressedUtxo;
use crate::builder::{ChangeAddr, Drafted, ProtocolParams, TransactionDraft};
use crate::error::WalletError;

/// A nanoERG quantity, optionally shown shifted by the ERG decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    value: u64,
    decimals: u8,
}

impl Amount {
    /// `value` nanoERG, shifted for display when `shift` is set.
    pub fn new(value: u64, shift: bool) -> Self {
        Self {
            value,
            decimals: if shift { ERG_DECIMALS } else { 0 },
        }
    }

    /// Raw value in nanoERG.
    pub fn value(&self) -> u64 {
        self.value
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.value);
        }
        let scale = 10u64.pow(u32::from(self.decimals));
        write!(
            f,
            "{}.{:0width$}",
            self.value / scale,
            self.value % scale,
            width = usize::from(self.decimals)
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// A draft ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    draft: TransactionDraft,
    sender_utxos: Vec<AddressedUtxo>,
    params: ProtocolParams,
}

impl SignRequest {
    /// Wrap a draft with the UTXOs it spends and its parameters.
    pub fn new(
        draft: TransactionDraft,
        sender_utxos: Vec<AddressedUtxo>,
        params: ProtocolParams,
    ) -> Self {
        Self {
            draft,
            sender_utxos,
            params,
        }
    }

    /// Wrap the result of a drafter call.
    pub fn from_drafted(drafted: Drafted, params: ProtocolParams) -> Self {
        Self::new(drafted.draft, drafted.sender_utxos, params)
    }

    /// The wrapped draft.
    pub fn draft(&self) -> &TransactionDraft {
        &self.draft
    }

    /// UTXOs consumed by the draft.
    pub fn sender_utxos(&self) -> &[AddressedUtxo] {
        &self.sender_utxos
    }

    /// Parameters the draft was built with.
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Id of the transaction.
    pub fn tx_id(&self) -> Result<TxId, WalletError> {
        self.draft.id()
    }

    fn outputs(&self) -> &[BoxCandidate] {
        &self.draft.tx.output_candidates
    }

    fn is_fee(&self, tree: &ErgoTree) -> bool {
        *tree == self.params.fee_address
    }

    fn is_change(&self, tree: &ErgoTree) -> bool {
        self.draft
            .change_addr
            .iter()
            .any(|c: &ChangeAddr| c.address == *tree)
    }

    /// Value leaving the wallet: sender inputs minus outputs returning to
    /// the request's change addresses.
    pub fn total_input(&self, shift: bool) -> Result<Amount, WalletError> {
        let inputs = sum(self.sender_utxos.iter().map(|u| u.utxo.value))?;
        let change = sum(
            self.outputs()
                .iter()
                .filter(|o| self.is_change(&o.ergo_tree))
                .map(|o| o.value),
        )?;
        let total = inputs.checked_sub(change).ok_or_else(|| {
            WalletError::AssertionFailure(format!(
                "change {change} exceeds sender inputs {inputs}"
            ))
        })?;
        Ok(Amount::new(total, shift))
    }

    /// Sum of every output except the fee box.
    pub fn total_output(&self, shift: bool) -> Result<Amount, WalletError> {
        let total = sum(
            self.outputs()
                .iter()
                .filter(|o| !self.is_fee(&o.ergo_tree))
                .map(|o| o.value),
        )?;
        Ok(Amount::new(total, shift))
    }

    /// Value of the fee box.
    pub fn fee(&self, shift: bool) -> Result<Amount, WalletError> {
        self.outputs()
            .iter()
            .find(|o| self.is_fee(&o.ergo_tree))
            .map(|o| Amount::new(o.value, shift))
            .ok_or(WalletError::FeeBoxNotFound)
    }

    /// Owner addresses of the sender UTXOs, first occurrence order.
    pub fn unique_sender_addresses(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        self.sender_utxos
            .iter()
            .filter(|u| seen.insert(&u.utxo.ergo_tree))
            .map(|u| Address::from_ergo_tree(&u.utxo.ergo_tree, self.params.network))
            .collect()
    }

    /// Owner addresses of the outputs, in output order.
    ///
    /// Without `include_change_and_fee` the fee box and change outputs are
    /// left out.
    pub fn receivers(&self, include_change_and_fee: bool) -> Vec<Address> {
        self.outputs()
            .iter()
            .filter(|o| {
                include_change_and_fee || !(self.is_fee(&o.ergo_tree) || self.is_change(&o.ergo_tree))
            })
            .map(|o| Address::from_ergo_tree(&o.ergo_tree, self.params.network))
            .collect()
    }

    /// Whether both requests spend the same inputs into the same output ids.
    pub fn is_equal(&self, other: &SignRequest) -> bool {
        if self.draft.tx.input_ids() != other.draft.tx.input_ids() {
            return false;
        }
        match (self.output_ids(), other.output_ids()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn output_ids(&self) -> Result<Vec<BoxId>, WalletError> {
        Ok(self.draft.outputs()?.into_iter().map(|b| b.box_id).collect())
    }

    /// Tokens held by the sender UTXOs, merged by id.
    pub fn total_input_tokens(&self) -> Result<Vec<Token>, WalletError> {
        Ok(merge_assets(
            self.sender_utxos.iter().map(|u| u.utxo.assets.as_slice()),
        )?)
    }

    /// Tokens carried by non-fee outputs, merged by id.
    pub fn total_output_tokens(&self) -> Result<Vec<Token>, WalletError> {
        Ok(merge_assets(
            self.outputs()
                .iter()
                .filter(|o| !self.is_fee(&o.ergo_tree))
                .map(|o| o.assets.as_slice()),
        )?)
    }

    /// Display summary of the request.
    pub fn summary(&self, shift: bool) -> Result<SignRequestSummary, WalletError> {
        Ok(SignRequestSummary {
            tx_id: self.tx_id()?,
            total_input: self.total_input(shift)?,
            total_output: self.total_output(shift)?,
            fee: self.fee(shift)?,
            senders: self.unique_sender_addresses(),
            receivers: self.receivers(false),
            change: self.draft.change_addr.clone(),
            tokens: self.total_output_tokens()?,
        })
    }
}

/// What a user confirms before signing.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignRequestSummary {
    /// Transaction id.
    pub tx_id: TxId,
    /// Value leaving the wallet.
    pub total_input: Amount,
    /// Value of non-fee outputs.
    pub total_output: Amount,
    /// Miner fee.
    pub fee: Amount,
    /// Distinct sender addresses.
    pub senders: Vec<Address>,
    /// Payment receivers (change and fee excluded).
    pub receivers: Vec<Address>,
    /// Change routed back to the wallet.
    pub change: Option<ChangeAddr>,
    /// Tokens carried by non-fee outputs.
    pub tokens: Vec<Token>,
}

fn sum(mut values: impl Iterator<Item = u64>) -> Result<u64, WalletError> {
    values.try_fold(0u64, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| WalletError::InvalidAmount("amount sum overflows u64".into()))
    })
}
