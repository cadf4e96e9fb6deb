//! Key derivation and signing.
//!
//! A [`SigningSession`] walks `Unsigned -> KeysDerived -> Signed`, landing in
//! `Failed` on the first error. Keys live in the session only between
//! derivation and signing.

use tracing::{debug, info, warn};

use erg_core::prover::{verify_signed_transaction, StateContext, TxProver};
use erg_core::types::{
    BoxCandidate, DataInput, Input, SignedTransaction, TxId, UnsignedTransaction, UnspentBox,
};

use crate::addressing::AddressedUtxo;
use crate::error::WalletError;
use crate::keys::{ExtendedKey, KeySet};
use crate::sign_request::SignRequest;

/// Progress of a signing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    /// Nothing done yet.
    Unsigned,
    /// Signing keys are derived and held by the session.
    KeysDerived,
    /// The transaction was signed.
    Signed,
    /// A step failed; the session cannot continue.
    Failed,
}

/// A signed transaction as the wallet reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    /// Transaction id.
    pub id: TxId,
    /// Inputs with their spending proofs.
    pub inputs: Vec<Input>,
    /// Read-only reference inputs.
    pub data_inputs: Vec<DataInput>,
    /// Outputs in order.
    pub outputs: Vec<BoxCandidate>,
}

impl SignedTx {
    /// Outputs with their box ids.
    pub fn output_boxes(&self) -> Result<Vec<UnspentBox>, WalletError> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let index = u16::try_from(i)
                    .map_err(|_| erg_core::error::TransactionError::OutputIndexOverflow(i))?;
                Ok(o.to_box(self.id, index)?)
            })
            .collect()
    }

    /// Check every spending proof against the boxes being spent.
    pub fn verify(&self, boxes_to_spend: &[UnspentBox]) -> Result<(), WalletError> {
        let signed = SignedTransaction {
            id: self.id,
            inputs: self.inputs.clone(),
            data_inputs: self.data_inputs.clone(),
            outputs: self.output_boxes()?,
        };
        Ok(verify_signed_transaction(&signed, boxes_to_spend)?)
    }
}

impl From<SignedTransaction> for SignedTx {
    fn from(signed: SignedTransaction) -> Self {
        Self {
            id: signed.id,
            inputs: signed.inputs,
            data_inputs: signed.data_inputs,
            outputs: signed
                .outputs
                .into_iter()
                .map(|b| BoxCandidate {
                    value: b.value,
                    ergo_tree: b.ergo_tree,
                    creation_height: b.creation_height,
                    assets: b.assets,
                    additional_registers: b.additional_registers,
                })
                .collect(),
        }
    }
}

/// One attempt at signing one transaction.
pub struct SigningSession<'a> {
    tx: &'a UnsignedTransaction,
    senders: &'a [AddressedUtxo],
    boxes_to_spend: Vec<UnspentBox>,
    state: SigningState,
    keys: Option<KeySet>,
}

impl<'a> SigningSession<'a> {
    /// Session signing `tx`.
    ///
    /// Keys are derived for `senders`; the prover sees `boxes_to_spend`,
    /// which must contain every box `tx` spends.
    pub fn new(
        tx: &'a UnsignedTransaction,
        senders: &'a [AddressedUtxo],
        boxes_to_spend: Vec<UnspentBox>,
    ) -> Self {
        Self {
            tx,
            senders,
            boxes_to_spend,
            state: SigningState::Unsigned,
            keys: None,
        }
    }

    /// Session signing a drafted request.
    pub fn for_request(request: &'a SignRequest) -> Self {
        let boxes = request
            .sender_utxos()
            .iter()
            .map(|u| u.utxo.clone())
            .collect();
        Self::new(&request.draft().tx, request.sender_utxos(), boxes)
    }

    /// Current state.
    pub fn state(&self) -> SigningState {
        self.state
    }

    /// Number of distinct signing keys held (0 before derivation).
    pub fn key_count(&self) -> usize {
        self.keys.as_ref().map_or(0, KeySet::len)
    }

    /// Derive the signing keys from `root`.
    pub fn derive_keys(&mut self, root: &ExtendedKey) -> Result<(), WalletError> {
        self.expect_state(SigningState::Unsigned)?;
        match KeySet::derive(self.senders, root) {
            Ok(keys) => {
                debug!(
                    senders = self.senders.len(),
                    keys = keys.len(),
                    "derived signing keys"
                );
                self.keys = Some(keys);
                self.state = SigningState::KeysDerived;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Sign with `prover`, consuming the derived keys.
    pub fn sign(&mut self, prover: &dyn TxProver) -> Result<SignedTx, WalletError> {
        self.expect_state(SigningState::KeysDerived)?;
        let Some(keys) = self.keys.take() else {
            return Err(self.fail(WalletError::AssertionFailure(
                "keys missing after derivation".into(),
            )));
        };

        if !self.tx.data_inputs.is_empty() {
            return Err(self.fail(WalletError::UnsupportedFeature(format!(
                "transaction references {} data inputs",
                self.tx.data_inputs.len()
            ))));
        }

        let result = prover.sign(
            keys.as_slice(),
            &StateContext::placeholder(),
            self.tx,
            &self.boxes_to_spend,
            &[],
        );
        drop(keys);

        match result {
            Ok(signed) => {
                self.state = SigningState::Signed;
                info!(
                    tx_id = %signed.id,
                    inputs = signed.inputs.len(),
                    outputs = signed.outputs.len(),
                    "signed transaction"
                );
                Ok(signed.into())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn expect_state(&self, expected: SigningState) -> Result<(), WalletError> {
        if self.state != expected {
            return Err(WalletError::AssertionFailure(format!(
                "signing session is {:?}, expected {:?}",
                self.state, expected
            )));
        }
        Ok(())
    }

    fn fail(&mut self, err: WalletError) -> WalletError {
        warn!(error = %err, "signing failed");
        self.keys = None;
        self.state = SigningState::Failed;
        err
    }
}

/// Signs transactions with an injected prover.
pub struct Signer<P> {
    prover: P,
}

impl<P: TxProver> Signer<P> {
    /// Signer using `prover`.
    pub fn new(prover: P) -> Self {
        Self { prover }
    }

    /// The prover in use.
    pub fn prover(&self) -> &P {
        &self.prover
    }

    /// Sign a drafted request with keys derived from `root`.
    pub fn sign_request(
        &self,
        request: &SignRequest,
        root: &ExtendedKey,
    ) -> Result<SignedTx, WalletError> {
        let mut session = SigningSession::for_request(request);
        session.derive_keys(root)?;
        session.sign(&self.prover)
    }

    /// Sign an externally built transaction.
    ///
    /// Keys are derived for `senders` only; `boxes_to_spend` supplies every
    /// box the transaction spends.
    pub fn sign_unsigned(
        &self,
        tx: &UnsignedTransaction,
        senders: &[AddressedUtxo],
        boxes_to_spend: Vec<UnspentBox>,
        root: &ExtendedKey,
    ) -> Result<SignedTx, WalletError> {
        let mut session = SigningSession::new(tx, senders, boxes_to_spend);
        session.derive_keys(root)?;
        session.sign(&self.prover)
    }
}
