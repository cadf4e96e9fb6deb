//! Transaction signing primitive.
//!
//! [`TxProver`] is the seam between the wallet and whatever produces spending
//! proofs. The wallet hands a prover its secrets, the unsigned transaction and
//! the concrete boxes it spends; the prover returns a [`SignedTransaction`].
//!
//! [`ErgoProver`] signs with ergo-lib's wallet, which evaluates each input's
//! script against a [`StateContext`] and produces Schnorr proofs over
//! [`UnsignedTransaction::bytes_to_sign`]. Only P2PK inputs are accepted and
//! data inputs are not supported.

use std::collections::{HashMap, HashSet};

use ergo_lib::chain::ergo_state_context::ErgoStateContext;
use ergo_lib::chain::parameters::Parameters;
use ergo_lib::ergo_chain_types::{Header, PreHeader};
use ergo_lib::wallet::signing::TransactionContext;
use ergo_lib::wallet::Wallet;
use tracing::debug;

use crate::crypto::{p2pk_key, KeyPair, PublicKey};
use crate::ergo;
use crate::error::{CryptoError, ProverError};
use crate::types::{
    BoxCandidate, BoxId, Input, SignedTransaction, SpendingProof, UnsignedInput,
    UnsignedTransaction, UnspentBox,
};

/// Number of recent headers a script context carries.
pub const HEADERS_IN_CONTEXT: usize = 10;

const PLACEHOLDER_HEADER: &str = include_str!("placeholder_header.json");

/// Chain state a prover may consult while evaluating scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct StateContext {
    /// Height of the block the transaction is expected in.
    pub height: u32,
    /// The most recent block headers as node JSON, newest first.
    pub last_headers: Vec<serde_json::Value>,
}

impl StateContext {
    /// Placeholder context for P2PK-only signing, which reads no chain state.
    pub fn placeholder() -> Self {
        let header = serde_json::from_str(PLACEHOLDER_HEADER).unwrap_or_default();
        Self {
            height: 0,
            last_headers: vec![header; HEADERS_IN_CONTEXT],
        }
    }

    /// Context from a node's `/blocks/lastHeaders/10` response.
    pub fn from_node_headers(json: &str) -> Result<Self, ProverError> {
        let last_headers: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| ProverError::StateContext(e.to_string()))?;
        let height = last_headers
            .first()
            .and_then(|h| h.get("height"))
            .and_then(serde_json::Value::as_u64)
            .and_then(|h| u32::try_from(h).ok())
            .ok_or_else(|| ProverError::StateContext("newest header has no height".into()))?;
        Ok(Self {
            height: height.saturating_add(1),
            last_headers,
        })
    }

    /// The ergo-lib state context. The pre-header extends the newest header
    /// to [`height`](Self::height).
    pub fn to_ergo(&self) -> Result<ErgoStateContext, ProverError> {
        let headers = self
            .last_headers
            .iter()
            .map(|h| {
                serde_json::from_value::<Header>(h.clone())
                    .map_err(|e| ProverError::StateContext(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let headers: [Header; HEADERS_IN_CONTEXT] = headers.try_into().map_err(|v: Vec<_>| {
            ProverError::StateContext(format!(
                "expected {HEADERS_IN_CONTEXT} headers, got {}",
                v.len()
            ))
        })?;
        let mut pre_header = PreHeader::from(headers[0].clone());
        if self.height > 0 {
            pre_header.height = self.height;
        }
        Ok(ErgoStateContext::new(pre_header, headers, Parameters::default()))
    }
}

/// Produces spending proofs for an unsigned transaction.
pub trait TxProver: Send + Sync {
    /// Sign every input of `tx`.
    ///
    /// `boxes_to_spend` must contain the box for each input; `data_boxes` the
    /// box for each data input.
    fn sign(
        &self,
        secrets: &[KeyPair],
        context: &StateContext,
        tx: &UnsignedTransaction,
        boxes_to_spend: &[UnspentBox],
        data_boxes: &[UnspentBox],
    ) -> Result<SignedTransaction, ProverError>;
}

/// Prover for P2PK-guarded inputs backed by `ergo_lib::wallet::Wallet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErgoProver;

impl TxProver for ErgoProver {
    fn sign(
        &self,
        secrets: &[KeyPair],
        context: &StateContext,
        tx: &UnsignedTransaction,
        boxes_to_spend: &[UnspentBox],
        data_boxes: &[UnspentBox],
    ) -> Result<SignedTransaction, ProverError> {
        if !tx.data_inputs.is_empty() || !data_boxes.is_empty() {
            return Err(ProverError::DataInputsUnsupported);
        }

        let by_id: HashMap<BoxId, &UnspentBox> =
            boxes_to_spend.iter().map(|b| (b.box_id, b)).collect();
        let known: HashSet<PublicKey> = secrets.iter().map(KeyPair::public_key).collect();

        let mut spent = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            let utxo = by_id
                .get(&input.box_id)
                .ok_or_else(|| ProverError::MissingInputBox(input.box_id.to_string()))?;
            let key = p2pk_key(&utxo.ergo_tree)
                .ok_or_else(|| ProverError::UnsupportedScript(input.box_id.to_string()))?;
            if !known.contains(&key) {
                return Err(ProverError::MissingSecret(input.box_id.to_string()));
            }
            spent.push(*utxo);
        }

        let ergo_boxes = spent
            .iter()
            .map(|b| ergo::to_ergo_box(b))
            .collect::<Result<Vec<_>, _>>()?;
        let unsigned = ergo::to_ergo_unsigned(tx)?;
        let tx_context = TransactionContext::new(unsigned, ergo_boxes, Vec::new())
            .map_err(|e| ProverError::Signing(e.to_string()))?;
        let state = context.to_ergo()?;

        let wallet = Wallet::from_secrets(secrets.iter().map(KeyPair::to_secret_key).collect());
        let signed = wallet
            .sign_transaction(tx_context, &state, None)
            .map_err(|e| ProverError::Signing(e.to_string()))?;

        let inputs = signed
            .inputs
            .iter()
            .zip(&tx.inputs)
            .map(|(signed_input, input)| Input {
                box_id: ergo::from_box_id(signed_input.box_id.clone()),
                spending_proof: SpendingProof {
                    proof_bytes: Vec::<u8>::from(signed_input.spending_proof.proof.clone()),
                    extension: input.extension.clone(),
                },
            })
            .collect::<Vec<_>>();
        debug!(inputs = inputs.len(), keys = secrets.len(), "signed transaction");

        Ok(SignedTransaction {
            id: ergo::from_tx_id(signed.id()),
            inputs,
            data_inputs: Vec::new(),
            outputs: tx.outputs()?,
        })
    }
}

/// Verify every spending proof of `signed` against the boxes it spends.
///
/// Rebuilds the unsigned transaction from the signed one, so any change to
/// inputs or outputs after signing invalidates the proofs.
pub fn verify_signed_transaction(
    signed: &SignedTransaction,
    boxes_to_spend: &[UnspentBox],
) -> Result<(), CryptoError> {
    let unsigned = UnsignedTransaction {
        inputs: signed
            .inputs
            .iter()
            .map(|i| UnsignedInput {
                box_id: i.box_id,
                extension: i.spending_proof.extension.clone(),
            })
            .collect(),
        data_inputs: signed.data_inputs.clone(),
        output_candidates: signed
            .outputs
            .iter()
            .map(|o| BoxCandidate {
                value: o.value,
                ergo_tree: o.ergo_tree.clone(),
                creation_height: o.creation_height,
                assets: o.assets.clone(),
                additional_registers: o.additional_registers.clone(),
            })
            .collect(),
    };
    let message = unsigned
        .bytes_to_sign()
        .map_err(|_| CryptoError::VerificationFailed)?;

    for input in &signed.inputs {
        let spent = boxes_to_spend
            .iter()
            .find(|b| b.box_id == input.box_id)
            .ok_or(CryptoError::VerificationFailed)?;
        let key = p2pk_key(&spent.ergo_tree).ok_or(CryptoError::InvalidPublicKey)?;
        key.verify(&message, &input.spending_proof.proof_bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAINNET_FEE_TREE;
    use crate::types::{DataInput, ErgoTree, Hash256, Registers};

    fn key(b: u8) -> KeyPair {
        KeyPair::from_secret_bytes([b; 32]).unwrap()
    }

    fn owned_box(nonce: u8, kp: &KeyPair, value: u64) -> UnspentBox {
        UnspentBox::new(
            value,
            kp.public_key().p2pk_tree(),
            1,
            vec![],
            Registers::new(),
            Hash256([nonce; 32]),
            0,
        )
        .unwrap()
    }

    fn spend(boxes: &[UnspentBox]) -> UnsignedTransaction {
        UnsignedTransaction {
            inputs: boxes.iter().map(|b| UnsignedInput::new(b.box_id)).collect(),
            data_inputs: vec![],
            output_candidates: vec![BoxCandidate::simple(
                1_000_000,
                key(0xAA).public_key().p2pk_tree(),
                5,
            )],
        }
    }

    #[test]
    fn placeholder_context_converts() {
        let context = StateContext::placeholder();
        assert_eq!(context.last_headers.len(), HEADERS_IN_CONTEXT);
        assert!(context.to_ergo().is_ok());
    }

    #[test]
    fn short_header_list_rejected() {
        let mut context = StateContext::placeholder();
        context.last_headers.truncate(3);
        assert!(matches!(
            context.to_ergo().unwrap_err(),
            ProverError::StateContext(_)
        ));
    }

    #[test]
    fn node_headers_set_next_height() {
        let headers = serde_json::to_string(&StateContext::placeholder().last_headers).unwrap();
        let context = StateContext::from_node_headers(&headers).unwrap();
        assert_eq!(context.height, 471_747);
        assert!(matches!(
            StateContext::from_node_headers("[]").unwrap_err(),
            ProverError::StateContext(_)
        ));
    }

    #[test]
    fn signs_and_verifies_every_input() {
        let kp1 = key(1);
        let kp2 = key(2);
        let boxes = vec![owned_box(1, &kp1, 1_000_000), owned_box(2, &kp2, 1_000_000)];
        let tx = spend(&boxes);

        let signed = ErgoProver
            .sign(&[kp1, kp2], &StateContext::placeholder(), &tx, &boxes, &[])
            .unwrap();

        assert_eq!(signed.id, tx.id().unwrap());
        assert_eq!(signed.inputs.len(), 2);
        assert_eq!(signed.inputs[0].box_id, boxes[0].box_id);
        assert_eq!(signed.inputs[0].spending_proof.proof_bytes.len(), 56);
        assert!(verify_signed_transaction(&signed, &boxes).is_ok());
    }

    #[test]
    fn one_key_for_many_inputs() {
        let kp = key(3);
        let boxes: Vec<_> = (1..=3).map(|i| owned_box(i, &kp, 1_000_000)).collect();
        let tx = spend(&boxes);
        let signed = ErgoProver
            .sign(&[kp], &StateContext::placeholder(), &tx, &boxes, &[])
            .unwrap();
        assert_eq!(signed.inputs.len(), 3);
        assert!(verify_signed_transaction(&signed, &boxes).is_ok());
    }

    #[test]
    fn duplicate_secrets_tolerated() {
        let kp = key(3);
        let boxes = vec![owned_box(1, &kp, 1_000_000)];
        let tx = spend(&boxes);
        let secrets = vec![kp.clone(), kp];
        assert!(ErgoProver
            .sign(&secrets, &StateContext::placeholder(), &tx, &boxes, &[])
            .is_ok());
    }

    #[test]
    fn missing_secret() {
        let boxes = vec![owned_box(1, &key(1), 1_000_000)];
        let err = ErgoProver
            .sign(&[key(2)], &StateContext::placeholder(), &spend(&boxes), &boxes, &[])
            .unwrap_err();
        assert!(matches!(err, ProverError::MissingSecret(_)));
    }

    #[test]
    fn missing_box() {
        let kp = key(1);
        let boxes = vec![owned_box(1, &kp, 1_000_000)];
        let err = ErgoProver
            .sign(&[kp], &StateContext::placeholder(), &spend(&boxes), &[], &[])
            .unwrap_err();
        assert!(matches!(err, ProverError::MissingInputBox(_)));
    }

    #[test]
    fn script_boxes_unsupported() {
        let fee = UnspentBox::new(
            1_000_000,
            ErgoTree::from_hex(MAINNET_FEE_TREE).unwrap(),
            1,
            vec![],
            Registers::new(),
            Hash256([1; 32]),
            0,
        )
        .unwrap();
        let boxes = vec![fee];
        let err = ErgoProver
            .sign(&[key(1)], &StateContext::placeholder(), &spend(&boxes), &boxes, &[])
            .unwrap_err();
        assert!(matches!(err, ProverError::UnsupportedScript(_)));
    }

    #[test]
    fn box_with_forged_id_rejected() {
        let kp = key(1);
        let mut forged = owned_box(1, &kp, 1_000_000);
        forged.value = 9_000_000;
        let boxes = vec![forged];
        let err = ErgoProver
            .sign(&[kp], &StateContext::placeholder(), &spend(&boxes), &boxes, &[])
            .unwrap_err();
        assert!(matches!(err, ProverError::Transaction(_)));
    }

    #[test]
    fn data_inputs_rejected() {
        let kp = key(1);
        let boxes = vec![owned_box(1, &kp, 1_000_000)];
        let mut tx = spend(&boxes);
        tx.data_inputs.push(DataInput { box_id: Hash256([9; 32]) });
        let err = ErgoProver
            .sign(&[kp], &StateContext::placeholder(), &tx, &boxes, &[])
            .unwrap_err();
        assert_eq!(err, ProverError::DataInputsUnsupported);
    }

    #[test]
    fn tampered_output_fails_verification() {
        let kp = key(1);
        let boxes = vec![owned_box(1, &kp, 2_000_000)];
        let tx = spend(&boxes);
        let mut signed = ErgoProver
            .sign(&[kp], &StateContext::placeholder(), &tx, &boxes, &[])
            .unwrap();
        signed.outputs[0].value += 1;
        assert_eq!(
            verify_signed_transaction(&signed, &boxes).unwrap_err(),
            CryptoError::VerificationFailed
        );
    }
}
