//! Conversions between the JSON-shaped box model and ergo-lib chain types.
//!
//! Box ids, transaction ids and the bytes every input signs are computed by
//! ergo-lib from these conversions, so they match what a node computes.

use std::collections::HashMap;

use ergo_lib::chain::transaction::unsigned::UnsignedTransaction as ErgoUnsignedTransaction;
use ergo_lib::chain::transaction::{
    DataInput as ErgoDataInput, TxId as ErgoTxId, UnsignedInput as ErgoUnsignedInput,
};
use ergo_lib::ergo_chain_types::Digest32;
use ergo_lib::ergotree_interpreter::sigma_protocol::prover::ContextExtension as ErgoContextExtension;
use ergo_lib::ergotree_ir::chain::ergo_box::box_value::BoxValue;
use ergo_lib::ergotree_ir::chain::ergo_box::{
    BoxId as ErgoBoxId, BoxTokens, ErgoBox, ErgoBoxCandidate, NonMandatoryRegisterId,
    NonMandatoryRegisters,
};
use ergo_lib::ergotree_ir::chain::token::{Token as ErgoToken, TokenAmount, TokenId as ErgoTokenId};
use ergo_lib::ergotree_ir::mir::constant::Constant;
use ergo_lib::ergotree_ir::serialization::SigmaSerializable;

use crate::error::TransactionError;
use crate::types::{
    BoxCandidate, ContextExtension, DataInput, Hash256, Registers, Token, UnsignedInput,
    UnsignedTransaction, UnspentBox,
};

impl From<Hash256> for Digest32 {
    fn from(hash: Hash256) -> Self {
        Digest32::from(hash.0)
    }
}

impl From<Digest32> for Hash256 {
    fn from(digest: Digest32) -> Self {
        Hash256(<[u8; 32]>::from(digest))
    }
}

pub(crate) fn box_id(id: &Hash256) -> ErgoBoxId {
    ErgoBoxId::from(Digest32::from(*id))
}

pub(crate) fn from_box_id(id: ErgoBoxId) -> Hash256 {
    Hash256::from(Digest32::from(id))
}

pub(crate) fn tx_id(id: &Hash256) -> ErgoTxId {
    ErgoTxId(Digest32::from(*id))
}

pub(crate) fn from_tx_id(id: ErgoTxId) -> Hash256 {
    Hash256::from(id.0)
}

fn value(value: u64) -> Result<BoxValue, TransactionError> {
    BoxValue::try_from(value).map_err(|e| TransactionError::InvalidBox(e.to_string()))
}

fn tokens(assets: &[Token]) -> Result<Option<BoxTokens>, TransactionError> {
    if assets.is_empty() {
        return Ok(None);
    }
    let converted = assets
        .iter()
        .map(|t| {
            let amount = TokenAmount::try_from(t.amount)
                .map_err(|e| TransactionError::InvalidBox(e.to_string()))?;
            Ok(ErgoToken {
                token_id: ErgoTokenId::from(Digest32::from(t.token_id)),
                amount,
            })
        })
        .collect::<Result<Vec<_>, TransactionError>>()?;
    BoxTokens::from_vec(converted)
        .map(Some)
        .map_err(|e| TransactionError::InvalidBox(e.to_string()))
}

fn register_id(key: &str) -> Result<NonMandatoryRegisterId, TransactionError> {
    Ok(match key {
        "R4" => NonMandatoryRegisterId::R4,
        "R5" => NonMandatoryRegisterId::R5,
        "R6" => NonMandatoryRegisterId::R6,
        "R7" => NonMandatoryRegisterId::R7,
        "R8" => NonMandatoryRegisterId::R8,
        "R9" => NonMandatoryRegisterId::R9,
        other => return Err(TransactionError::UnknownRegister(other.to_string())),
    })
}

fn decode_hex(field: &'static str, s: &str) -> Result<Vec<u8>, TransactionError> {
    hex::decode(s).map_err(|e| TransactionError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

fn registers(registers: &Registers) -> Result<NonMandatoryRegisters, TransactionError> {
    let mut map = HashMap::with_capacity(registers.len());
    for (key, hex_value) in registers {
        let bytes = decode_hex("additionalRegisters", hex_value)?;
        let constant = Constant::sigma_parse_bytes(&bytes)
            .map_err(|e| TransactionError::InvalidBox(format!("register {key}: {e}")))?;
        map.insert(register_id(key)?, constant);
    }
    NonMandatoryRegisters::new(map).map_err(|e| TransactionError::InvalidBox(e.to_string()))
}

/// Context extension in ergo-lib form.
///
/// Keys are decimal variable ids, values hex-serialized constants.
fn extension(ext: &ContextExtension) -> Result<ErgoContextExtension, TransactionError> {
    if ext.is_empty() {
        return Ok(ErgoContextExtension::empty());
    }
    let count = u8::try_from(ext.len())
        .map_err(|_| TransactionError::InvalidTransaction("too many extension variables".into()))?;
    let mut bytes = vec![count];
    for (key, hex_value) in ext {
        let id: u8 = key.parse().map_err(|_| {
            TransactionError::InvalidTransaction(format!("extension key {key} is not a u8"))
        })?;
        bytes.push(id);
        bytes.extend_from_slice(&decode_hex("extension", hex_value)?);
    }
    ErgoContextExtension::sigma_parse_bytes(&bytes)
        .map_err(|e| TransactionError::InvalidTransaction(format!("extension: {e}")))
}

/// An output candidate in ergo-lib form.
pub fn to_ergo_candidate(candidate: &BoxCandidate) -> Result<ErgoBoxCandidate, TransactionError> {
    Ok(ErgoBoxCandidate {
        value: value(candidate.value)?,
        ergo_tree: candidate.ergo_tree.parse()?,
        tokens: tokens(&candidate.assets)?,
        additional_registers: registers(&candidate.additional_registers)?,
        creation_height: candidate.creation_height,
    })
}

/// An unspent box in ergo-lib form.
///
/// ergo-lib derives the id from the box contents; a claimed id that differs
/// is rejected.
pub fn to_ergo_box(utxo: &UnspentBox) -> Result<ErgoBox, TransactionError> {
    let ergo_box = ErgoBox::new(
        value(utxo.value)?,
        utxo.ergo_tree.parse()?,
        tokens(&utxo.assets)?,
        registers(&utxo.additional_registers)?,
        utxo.creation_height,
        tx_id(&utxo.transaction_id),
        utxo.index,
    )
    .map_err(|e| TransactionError::InvalidBox(e.to_string()))?;
    let computed = from_box_id(ergo_box.box_id());
    if computed != utxo.box_id {
        return Err(TransactionError::BoxIdMismatch {
            claimed: utxo.box_id.to_string(),
            computed: computed.to_string(),
        });
    }
    Ok(ergo_box)
}

/// Id of the box `candidate` becomes as output `index` of `tx`.
pub fn candidate_box_id(
    candidate: &BoxCandidate,
    tx: &Hash256,
    index: u16,
) -> Result<Hash256, TransactionError> {
    let ergo_box = ErgoBox::from_box_candidate(&to_ergo_candidate(candidate)?, tx_id(tx), index)
        .map_err(|e| TransactionError::InvalidBox(e.to_string()))?;
    Ok(from_box_id(ergo_box.box_id()))
}

/// An unsigned transaction in ergo-lib form.
pub fn to_ergo_unsigned(tx: &UnsignedTransaction) -> Result<ErgoUnsignedTransaction, TransactionError> {
    let inputs = tx
        .inputs
        .iter()
        .map(|i: &UnsignedInput| {
            Ok(ErgoUnsignedInput::new(box_id(&i.box_id), extension(&i.extension)?))
        })
        .collect::<Result<Vec<_>, TransactionError>>()?;
    let data_inputs = tx
        .data_inputs
        .iter()
        .map(|d: &DataInput| ErgoDataInput { box_id: box_id(&d.box_id) })
        .collect();
    let outputs = tx
        .output_candidates
        .iter()
        .map(to_ergo_candidate)
        .collect::<Result<Vec<_>, TransactionError>>()?;
    ErgoUnsignedTransaction::new_from_vec(inputs, data_inputs, outputs)
        .map_err(|e| TransactionError::InvalidTransaction(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAINNET_FEE_TREE;
    use crate::types::ErgoTree;

    fn fee_box() -> UnspentBox {
        UnspentBox::new(
            1_000_000,
            ErgoTree::from_hex(MAINNET_FEE_TREE).unwrap(),
            100,
            vec![Token { token_id: Hash256([3; 32]), amount: 7 }],
            Registers::new(),
            Hash256([9; 32]),
            2,
        )
        .unwrap()
    }

    #[test]
    fn digest_roundtrip() {
        let h = Hash256([0x5A; 32]);
        assert_eq!(Hash256::from(Digest32::from(h)), h);
        assert_eq!(from_box_id(box_id(&h)), h);
        assert_eq!(from_tx_id(tx_id(&h)), h);
    }

    #[test]
    fn box_conversion_keeps_contents() {
        let utxo = fee_box();
        let ergo_box = to_ergo_box(&utxo).unwrap();
        assert_eq!(u64::from(ergo_box.value), 1_000_000);
        assert_eq!(ergo_box.creation_height, 100);
        assert_eq!(ergo_box.index, 2);
        assert_eq!(ergo_box.tokens.map(|t| t.len()), Some(1));
    }

    #[test]
    fn tampered_box_id_rejected() {
        let mut utxo = fee_box();
        utxo.box_id = Hash256([1; 32]);
        assert!(matches!(
            to_ergo_box(&utxo).unwrap_err(),
            TransactionError::BoxIdMismatch { .. }
        ));
    }

    #[test]
    fn zero_value_rejected() {
        let mut candidate = BoxCandidate::simple(1, ErgoTree::from_hex(MAINNET_FEE_TREE).unwrap(), 1);
        candidate.value = 0;
        assert!(matches!(
            to_ergo_candidate(&candidate).unwrap_err(),
            TransactionError::InvalidBox(_)
        ));
    }

    #[test]
    fn register_constants_parsed() {
        let mut candidate = BoxCandidate::simple(1_000_000, ErgoTree::from_hex(MAINNET_FEE_TREE).unwrap(), 1);
        // SInt constant 1 (type 0x04, zig-zag VLQ 0x02).
        candidate.additional_registers.insert("R4".into(), "0402".into());
        assert!(to_ergo_candidate(&candidate).is_ok());

        candidate.additional_registers.insert("R4".into(), "ff".into());
        assert!(matches!(
            to_ergo_candidate(&candidate).unwrap_err(),
            TransactionError::InvalidBox(_)
        ));
    }

    #[test]
    fn extension_keys_must_be_ids() {
        let mut ext = ContextExtension::new();
        ext.insert("x".into(), "0402".into());
        assert!(matches!(
            extension(&ext).unwrap_err(),
            TransactionError::InvalidTransaction(_)
        ));
        let mut ext = ContextExtension::new();
        ext.insert("1".into(), "0402".into());
        assert!(extension(&ext).is_ok());
    }
}
