//! JSON wire format shared with third-party callers.
//!
//! Field names and shapes are fixed by existing callers. Values and token
//! amounts go out as decimal strings and are accepted as strings or JSON
//! numbers. Ids, trees and proofs travel as hex strings and are checked when
//! a record is converted into a core type.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use erg_core::types::{
    BoxCandidate, DataInput, ErgoTree, Hash256, Input, Registers, SpendingProof, Token,
    UnsignedInput, UnsignedTransaction, UnspentBox,
};
use erg_wallet::{AddressedUtxo, Addressing, SignedTx};

use crate::error::ConnectorError;

/// `u64` as a decimal string, read from a string or a number.
mod amount {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = u64;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
                u64::try_from(v).map_err(|_| E::custom(format!("negative amount: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
                u64::from_str(v.trim()).map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
            }
        }

        d.deserialize_any(AmountVisitor)
    }
}

fn parse_id(field: &'static str, s: &str) -> Result<Hash256, ConnectorError> {
    s.parse().map_err(|e| ConnectorError::parse(field, e))
}

fn parse_tree(s: &str) -> Result<ErgoTree, ConnectorError> {
    ErgoTree::from_hex(s).map_err(|e| ConnectorError::parse("ergoTree", e))
}

/// A token amount on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireToken {
    pub token_id: String,
    #[serde(with = "amount")]
    pub amount: u64,
}

impl From<&Token> for WireToken {
    fn from(t: &Token) -> Self {
        Self {
            token_id: t.token_id.to_string(),
            amount: t.amount,
        }
    }
}

impl TryFrom<&WireToken> for Token {
    type Error = ConnectorError;

    fn try_from(t: &WireToken) -> Result<Self, Self::Error> {
        Ok(Token {
            token_id: parse_id("tokenId", &t.token_id)?,
            amount: t.amount,
        })
    }
}

fn tokens_from_wire(assets: &[WireToken]) -> Result<Vec<Token>, ConnectorError> {
    let tokens = assets.iter().map(Token::try_from).collect::<Result<Vec<_>, _>>()?;
    erg_core::types::validate_assets(&tokens).map_err(|e| ConnectorError::parse("assets", e))?;
    Ok(tokens)
}

fn registers_from_wire(registers: &BTreeMap<String, String>) -> Result<Registers, ConnectorError> {
    erg_core::types::validate_registers(registers)
        .map_err(|e| ConnectorError::parse("additionalRegisters", e))?;
    Ok(registers.clone())
}

/// An unspent box on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireBox {
    pub box_id: String,
    #[serde(with = "amount")]
    pub value: u64,
    pub ergo_tree: String,
    #[serde(default)]
    pub assets: Vec<WireToken>,
    #[serde(default)]
    pub additional_registers: BTreeMap<String, String>,
    pub creation_height: u32,
    pub transaction_id: String,
    pub index: u16,
}

impl From<&UnspentBox> for WireBox {
    fn from(b: &UnspentBox) -> Self {
        Self {
            box_id: b.box_id.to_string(),
            value: b.value,
            ergo_tree: b.ergo_tree.to_hex(),
            assets: b.assets.iter().map(WireToken::from).collect(),
            additional_registers: b.additional_registers.clone(),
            creation_height: b.creation_height,
            transaction_id: b.transaction_id.to_string(),
            index: b.index,
        }
    }
}

impl TryFrom<&WireBox> for UnspentBox {
    type Error = ConnectorError;

    fn try_from(b: &WireBox) -> Result<Self, Self::Error> {
        Ok(UnspentBox {
            box_id: parse_id("boxId", &b.box_id)?,
            value: b.value,
            ergo_tree: parse_tree(&b.ergo_tree)?,
            creation_height: b.creation_height,
            assets: tokens_from_wire(&b.assets)?,
            additional_registers: registers_from_wire(&b.additional_registers)?,
            transaction_id: parse_id("transactionId", &b.transaction_id)?,
            index: b.index,
        })
    }
}

/// A wallet box with the addressing of its key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WireAddressedUtxo {
    #[serde(flatten)]
    pub utxo: WireBox,
    pub addressing: Addressing,
}

impl From<&AddressedUtxo> for WireAddressedUtxo {
    fn from(u: &AddressedUtxo) -> Self {
        Self {
            utxo: WireBox::from(&u.utxo),
            addressing: u.addressing.clone(),
        }
    }
}

impl TryFrom<&WireAddressedUtxo> for AddressedUtxo {
    type Error = ConnectorError;

    fn try_from(u: &WireAddressedUtxo) -> Result<Self, Self::Error> {
        Ok(AddressedUtxo {
            utxo: UnspentBox::try_from(&u.utxo)?,
            addressing: u.addressing.clone(),
        })
    }
}

/// An output candidate on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireBoxCandidate {
    #[serde(with = "amount")]
    pub value: u64,
    pub ergo_tree: String,
    pub creation_height: u32,
    #[serde(default)]
    pub assets: Vec<WireToken>,
    #[serde(default)]
    pub additional_registers: BTreeMap<String, String>,
}

impl From<&BoxCandidate> for WireBoxCandidate {
    fn from(c: &BoxCandidate) -> Self {
        Self {
            value: c.value,
            ergo_tree: c.ergo_tree.to_hex(),
            creation_height: c.creation_height,
            assets: c.assets.iter().map(WireToken::from).collect(),
            additional_registers: c.additional_registers.clone(),
        }
    }
}

impl TryFrom<&WireBoxCandidate> for BoxCandidate {
    type Error = ConnectorError;

    fn try_from(c: &WireBoxCandidate) -> Result<Self, Self::Error> {
        Ok(BoxCandidate {
            value: c.value,
            ergo_tree: parse_tree(&c.ergo_tree)?,
            creation_height: c.creation_height,
            assets: tokens_from_wire(&c.assets)?,
            additional_registers: registers_from_wire(&c.additional_registers)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireUnsignedInput {
    pub box_id: String,
    #[serde(default)]
    pub extension: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireDataInput {
    pub box_id: String,
}

/// An unsigned transaction on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireUnsignedTx {
    pub inputs: Vec<WireUnsignedInput>,
    #[serde(default)]
    pub data_inputs: Vec<WireDataInput>,
    pub outputs: Vec<WireBoxCandidate>,
}

impl WireUnsignedTx {
    /// Parse and validate a JSON unsigned transaction.
    pub fn parse(json: &str) -> Result<UnsignedTransaction, ConnectorError> {
        let wire: WireUnsignedTx =
            serde_json::from_str(json).map_err(|e| ConnectorError::parse("tx", e))?;
        UnsignedTransaction::try_from(&wire)
    }
}

impl From<&UnsignedTransaction> for WireUnsignedTx {
    fn from(tx: &UnsignedTransaction) -> Self {
        Self {
            inputs: tx
                .inputs
                .iter()
                .map(|i| WireUnsignedInput {
                    box_id: i.box_id.to_string(),
                    extension: i.extension.clone(),
                })
                .collect(),
            data_inputs: tx
                .data_inputs
                .iter()
                .map(|d| WireDataInput {
                    box_id: d.box_id.to_string(),
                })
                .collect(),
            outputs: tx.output_candidates.iter().map(WireBoxCandidate::from).collect(),
        }
    }
}

impl TryFrom<&WireUnsignedTx> for UnsignedTransaction {
    type Error = ConnectorError;

    fn try_from(tx: &WireUnsignedTx) -> Result<Self, Self::Error> {
        Ok(UnsignedTransaction {
            inputs: tx
                .inputs
                .iter()
                .map(|i| {
                    Ok(UnsignedInput {
                        box_id: parse_id("inputs.boxId", &i.box_id)?,
                        extension: i.extension.clone(),
                    })
                })
                .collect::<Result<_, ConnectorError>>()?,
            data_inputs: tx
                .data_inputs
                .iter()
                .map(|d| {
                    Ok(DataInput {
                        box_id: parse_id("dataInputs.boxId", &d.box_id)?,
                    })
                })
                .collect::<Result<_, ConnectorError>>()?,
            output_candidates: tx
                .outputs
                .iter()
                .map(BoxCandidate::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireSpendingProof {
    pub proof_bytes: String,
    #[serde(default)]
    pub extension: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireSignedInput {
    pub box_id: String,
    pub spending_proof: WireSpendingProof,
}

/// A signed transaction on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireSignedTx {
    pub id: String,
    pub inputs: Vec<WireSignedInput>,
    #[serde(default)]
    pub data_inputs: Vec<WireDataInput>,
    pub outputs: Vec<WireBox>,
}

impl TryFrom<&SignedTx> for WireSignedTx {
    type Error = ConnectorError;

    fn try_from(tx: &SignedTx) -> Result<Self, Self::Error> {
        Ok(Self {
            id: tx.id.to_string(),
            inputs: tx
                .inputs
                .iter()
                .map(|i| WireSignedInput {
                    box_id: i.box_id.to_string(),
                    spending_proof: WireSpendingProof {
                        proof_bytes: hex::encode(&i.spending_proof.proof_bytes),
                        extension: i.spending_proof.extension.clone(),
                    },
                })
                .collect(),
            data_inputs: tx
                .data_inputs
                .iter()
                .map(|d| WireDataInput {
                    box_id: d.box_id.to_string(),
                })
                .collect(),
            outputs: tx.output_boxes()?.iter().map(WireBox::from).collect(),
        })
    }
}

impl TryFrom<&WireSignedTx> for SignedTx {
    type Error = ConnectorError;

    fn try_from(tx: &WireSignedTx) -> Result<Self, Self::Error> {
        let id = parse_id("id", &tx.id)?;
        let mut outputs = Vec::with_capacity(tx.outputs.len());
        for (i, wire) in tx.outputs.iter().enumerate() {
            let b = UnspentBox::try_from(wire)?;
            if b.transaction_id != id || usize::from(b.index) != i {
                return Err(ConnectorError::parse(
                    "outputs",
                    format!("output {i} does not belong to transaction {id}"),
                ));
            }
            outputs.push(BoxCandidate {
                value: b.value,
                ergo_tree: b.ergo_tree,
                creation_height: b.creation_height,
                assets: b.assets,
                additional_registers: b.additional_registers,
            });
        }
        Ok(SignedTx {
            id,
            inputs: tx
                .inputs
                .iter()
                .map(|i| {
                    Ok(Input {
                        box_id: parse_id("inputs.boxId", &i.box_id)?,
                        spending_proof: SpendingProof {
                            proof_bytes: hex::decode(&i.spending_proof.proof_bytes)
                                .map_err(|e| ConnectorError::parse("proofBytes", e))?,
                            extension: i.spending_proof.extension.clone(),
                        },
                    })
                })
                .collect::<Result<_, ConnectorError>>()?,
            data_inputs: tx
                .data_inputs
                .iter()
                .map(|d| {
                    Ok(DataInput {
                        box_id: parse_id("dataInputs.boxId", &d.box_id)?,
                    })
                })
                .collect::<Result<_, ConnectorError>>()?,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erg_core::crypto::KeyPair;
    use serde_json::json;

    fn receiver_tree() -> ErgoTree {
        KeyPair::from_secret_bytes([0xAA; 32]).unwrap().public_key().p2pk_tree()
    }

    fn sample_box() -> UnspentBox {
        let mut registers = Registers::new();
        registers.insert("R4".into(), "0e0101".into());
        UnspentBox {
            box_id: Hash256([1; 32]),
            value: 1_100_000,
            ergo_tree: ErgoTree::from_bytes(vec![0x00, 0x08, 0xcd, 0x02]),
            creation_height: 77,
            assets: vec![Token {
                token_id: Hash256([7; 32]),
                amount: 12_340,
            }],
            additional_registers: registers,
            transaction_id: Hash256([2; 32]),
            index: 3,
        }
    }

    #[test]
    fn box_field_names_and_string_values() {
        let json = serde_json::to_value(WireBox::from(&sample_box())).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "additionalRegisters",
                "assets",
                "boxId",
                "creationHeight",
                "ergoTree",
                "index",
                "transactionId",
                "value"
            ]
        );
        assert_eq!(json["value"], "1100000");
        assert_eq!(json["assets"][0]["amount"], "12340");
        assert_eq!(json["ergoTree"], "0008cd02");
        assert_eq!(json["additionalRegisters"]["R4"], "0e0101");
    }

    #[test]
    fn numbers_accepted_for_values() {
        let json = json!({
            "boxId": Hash256([1; 32]).to_string(),
            "value": 1100000,
            "ergoTree": "0008cd02",
            "assets": [{"tokenId": Hash256([7; 32]).to_string(), "amount": 12340}],
            "additionalRegisters": {"R4": "0e0101"},
            "creationHeight": 77,
            "transactionId": Hash256([2; 32]).to_string(),
            "index": 3
        });
        let wire: WireBox = serde_json::from_value(json).unwrap();
        assert_eq!(UnspentBox::try_from(&wire).unwrap(), sample_box());
    }

    #[test]
    fn negative_value_rejected() {
        let json = json!({
            "boxId": "00", "value": -1, "ergoTree": "", "creationHeight": 0,
            "transactionId": "00", "index": 0
        });
        assert!(serde_json::from_value::<WireBox>(json).is_err());
    }

    #[test]
    fn bad_ids_are_typed_parse_errors() {
        let mut wire = WireBox::from(&sample_box());
        wire.box_id = "zz".into();
        assert!(matches!(
            UnspentBox::try_from(&wire).unwrap_err(),
            ConnectorError::Parse { field: "boxId", .. }
        ));

        let mut wire = WireBox::from(&sample_box());
        wire.ergo_tree = "abc".into();
        assert!(matches!(
            UnspentBox::try_from(&wire).unwrap_err(),
            ConnectorError::Parse { field: "ergoTree", .. }
        ));

        let mut wire = WireBox::from(&sample_box());
        wire.additional_registers.insert("R2".into(), "00".into());
        assert!(matches!(
            UnspentBox::try_from(&wire).unwrap_err(),
            ConnectorError::Parse { field: "additionalRegisters", .. }
        ));
    }

    #[test]
    fn duplicate_tokens_rejected() {
        let mut wire = WireBox::from(&sample_box());
        let dup = wire.assets[0].clone();
        wire.assets.push(dup);
        assert!(matches!(
            UnspentBox::try_from(&wire).unwrap_err(),
            ConnectorError::Parse { field: "assets", .. }
        ));
    }

    #[test]
    fn addressed_utxo_is_box_plus_addressing() {
        let utxo = AddressedUtxo {
            utxo: sample_box(),
            addressing: Addressing::bip44(0, 0, 1),
        };
        let json = serde_json::to_value(WireAddressedUtxo::from(&utxo)).unwrap();
        assert_eq!(json["boxId"], Hash256([1; 32]).to_string());
        assert_eq!(json["addressing"]["startLevel"], 1);
        let wire: WireAddressedUtxo = serde_json::from_value(json).unwrap();
        assert_eq!(AddressedUtxo::try_from(&wire).unwrap(), utxo);
    }

    #[test]
    fn unsigned_tx_parse() {
        let json = json!({
            "inputs": [{"boxId": Hash256([1; 32]).to_string()}],
            "outputs": [{"value": "1000000", "ergoTree": "aa", "creationHeight": 5}]
        })
        .to_string();
        let tx = WireUnsignedTx::parse(&json).unwrap();
        assert_eq!(tx.inputs, vec![UnsignedInput::new(Hash256([1; 32]))]);
        assert!(tx.data_inputs.is_empty());
        assert_eq!(
            tx.output_candidates,
            vec![BoxCandidate::simple(1_000_000, ErgoTree::from_bytes(vec![0xAA]), 5)]
        );
        assert_eq!(WireUnsignedTx::from(&tx).inputs[0].box_id, Hash256([1; 32]).to_string());
    }

    #[test]
    fn unsigned_tx_malformed_json() {
        assert!(matches!(
            WireUnsignedTx::parse("{\"inputs\": 5}").unwrap_err(),
            ConnectorError::Parse { field: "tx", .. }
        ));
    }

    #[test]
    fn signed_tx_wire_shape() {
        let candidate = BoxCandidate::simple(1_000_000, receiver_tree(), 5);
        let signed = SignedTx {
            id: Hash256([9; 32]),
            inputs: vec![Input {
                box_id: Hash256([1; 32]),
                spending_proof: SpendingProof {
                    proof_bytes: vec![0xAB; 64],
                    extension: Default::default(),
                },
            }],
            data_inputs: vec![],
            outputs: vec![candidate],
        };
        let wire = WireSignedTx::try_from(&signed).unwrap();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["id"], Hash256([9; 32]).to_string());
        assert_eq!(json["inputs"][0]["spendingProof"]["proofBytes"], "ab".repeat(64));
        assert_eq!(json["outputs"][0]["transactionId"], Hash256([9; 32]).to_string());
        assert_eq!(json["outputs"][0]["index"], 0);
        assert_eq!(
            json["outputs"][0]["boxId"],
            signed.output_boxes().unwrap()[0].box_id.to_string()
        );
        assert_eq!(SignedTx::try_from(&wire).unwrap(), signed);
    }

    #[test]
    fn signed_tx_foreign_output_rejected() {
        let signed = SignedTx {
            id: Hash256([9; 32]),
            inputs: vec![],
            data_inputs: vec![],
            outputs: vec![BoxCandidate::simple(1, receiver_tree(), 1)],
        };
        let mut wire = WireSignedTx::try_from(&signed).unwrap();
        wire.outputs[0].transaction_id = Hash256([8; 32]).to_string();
        assert!(matches!(
            SignedTx::try_from(&wire).unwrap_err(),
            ConnectorError::Parse { field: "outputs", .. }
        ));
    }
}
