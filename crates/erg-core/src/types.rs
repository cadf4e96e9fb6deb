//! Core protocol types: boxes, tokens, transactions.
//!
//! All monetary values are in nanoERG (1 ERG = 10^9 nanoERG).
//! Ids are 32-byte Blake2b digests rendered as lowercase hex, computed by
//! ergo-lib through [`crate::ergo`].

use ergo_lib::ergotree_ir::ergo_tree::ErgoTree as ParsedTree;
use ergo_lib::ergotree_ir::serialization::SigmaSerializable;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::REGISTER_KEYS;
use crate::ergo;
use crate::error::TransactionError;

/// A 32-byte hash value.
///
/// Used for box ids, transaction ids and token ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

/// Id of a box (unspent output).
pub type BoxId = Hash256;
/// Id of a transaction.
pub type TxId = Hash256;
/// Id of a token; equals the id of the first input of its minting transaction.
pub type TokenId = Hash256;

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Hash256 {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TransactionError::InvalidHex {
            field: "id",
            reason: e.to_string(),
        })?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            TransactionError::InvalidLength {
                field: "id",
                expected: 32,
                got: bytes.len(),
            }
        })?;
        Ok(Self(arr))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serialized spending condition guarding a box.
///
/// Two boxes belong to the same owner exactly when their trees are byte-equal.
/// The bytes are kept as received; [`parse`](Self::parse) hands them to ergo-lib.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ErgoTree(Vec<u8>);

impl ErgoTree {
    /// Wrap raw tree bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded tree.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(s).map_err(|e| TransactionError::InvalidHex {
            field: "ergoTree",
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Raw tree bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse into an ergo-lib tree.
    pub fn parse(&self) -> Result<ParsedTree, TransactionError> {
        ParsedTree::sigma_parse_bytes(&self.0)
            .map_err(|e| TransactionError::InvalidErgoTree(e.to_string()))
    }

    /// Serialize an ergo-lib tree.
    pub fn from_parsed(tree: &ParsedTree) -> Result<Self, TransactionError> {
        tree.sigma_serialize_bytes()
            .map(Self)
            .map_err(|e| TransactionError::InvalidErgoTree(e.to_string()))
    }
}

impl fmt::Debug for ErgoTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErgoTree({})", self.to_hex())
    }
}

impl fmt::Display for ErgoTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ErgoTree {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ErgoTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ErgoTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An amount of a single token held in a box.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Token identifier.
    pub token_id: TokenId,
    /// Amount in the token's smallest unit.
    pub amount: u64,
}

/// Non-mandatory registers of a box: register key (`R4`..`R9`) to hex value.
pub type Registers = BTreeMap<String, String>;

/// Check register keys and hex values.
pub fn validate_registers(registers: &Registers) -> Result<(), TransactionError> {
    for (key, value) in registers {
        if !REGISTER_KEYS.contains(&key.as_str()) {
            return Err(TransactionError::UnknownRegister(key.clone()));
        }
        hex::decode(value).map_err(|e| TransactionError::InvalidHex {
            field: "additionalRegisters",
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Reject asset lists that name the same token twice.
pub fn validate_assets(assets: &[Token]) -> Result<(), TransactionError> {
    let mut seen = std::collections::HashSet::with_capacity(assets.len());
    for token in assets {
        if !seen.insert(token.token_id) {
            return Err(TransactionError::DuplicateToken(token.token_id.to_string()));
        }
    }
    Ok(())
}

/// A spendable output: created by a confirmed transaction, not yet spent.
///
/// The core never mutates a box; it only reads and references it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnspentBox {
    /// Unique box id.
    pub box_id: BoxId,
    /// Value in nanoERG.
    pub value: u64,
    /// Owner script.
    pub ergo_tree: ErgoTree,
    /// Height the box claims to have been created at.
    pub creation_height: u32,
    /// Tokens held, token ids unique within the list.
    pub assets: Vec<Token>,
    /// Registers R4..R9.
    pub additional_registers: Registers,
    /// Transaction that created this box.
    pub transaction_id: TxId,
    /// Output index within the creating transaction.
    pub index: u16,
}

impl UnspentBox {
    /// A box with its id computed from its contents.
    pub fn new(
        value: u64,
        ergo_tree: ErgoTree,
        creation_height: u32,
        assets: Vec<Token>,
        additional_registers: Registers,
        transaction_id: TxId,
        index: u16,
    ) -> Result<Self, TransactionError> {
        let candidate = BoxCandidate {
            value,
            ergo_tree,
            creation_height,
            assets,
            additional_registers,
        };
        candidate.to_box(transaction_id, index)
    }

    /// Check the asset and register invariants.
    pub fn validate(&self) -> Result<(), TransactionError> {
        validate_assets(&self.assets)?;
        validate_registers(&self.additional_registers)
    }

    /// Check the box id against the contents.
    pub fn verify_id(&self) -> Result<(), TransactionError> {
        ergo::to_ergo_box(self).map(|_| ())
    }

    /// Amount of `token_id` held in this box (0 if absent).
    pub fn token_amount(&self, token_id: &TokenId) -> u64 {
        self.assets
            .iter()
            .find(|t| t.token_id == *token_id)
            .map_or(0, |t| t.amount)
    }
}

/// An output before its transaction id (and hence box id) is known.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoxCandidate {
    /// Value in nanoERG.
    pub value: u64,
    /// Owner script.
    pub ergo_tree: ErgoTree,
    /// Creation height.
    pub creation_height: u32,
    /// Tokens carried.
    pub assets: Vec<Token>,
    /// Registers R4..R9.
    pub additional_registers: Registers,
}

impl BoxCandidate {
    /// A plain value box with no tokens or registers.
    pub fn simple(value: u64, ergo_tree: ErgoTree, creation_height: u32) -> Self {
        Self {
            value,
            ergo_tree,
            creation_height,
            assets: Vec::new(),
            additional_registers: Registers::new(),
        }
    }

    /// Materialize this candidate as output `index` of transaction `tx_id`.
    pub fn to_box(&self, tx_id: TxId, index: u16) -> Result<UnspentBox, TransactionError> {
        Ok(UnspentBox {
            box_id: ergo::candidate_box_id(self, &tx_id, index)?,
            value: self.value,
            ergo_tree: self.ergo_tree.clone(),
            creation_height: self.creation_height,
            assets: self.assets.clone(),
            additional_registers: self.additional_registers.clone(),
            transaction_id: tx_id,
            index,
        })
    }
}

/// Context extension variables attached to an input (hex values by id).
pub type ContextExtension = BTreeMap<String, String>;

/// An input of an unsigned transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedInput {
    /// Box being spent.
    pub box_id: BoxId,
    /// Context extension (usually empty).
    #[serde(default)]
    pub extension: ContextExtension,
}

impl UnsignedInput {
    /// Input spending `box_id` with an empty extension.
    pub fn new(box_id: BoxId) -> Self {
        Self {
            box_id,
            extension: ContextExtension::new(),
        }
    }
}

/// A read-only reference input.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataInput {
    /// Referenced box.
    pub box_id: BoxId,
}

/// A transaction without spending proofs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    /// Inputs in spending order.
    pub inputs: Vec<UnsignedInput>,
    /// Read-only reference inputs.
    pub data_inputs: Vec<DataInput>,
    /// Outputs in creation order.
    pub output_candidates: Vec<BoxCandidate>,
}

impl UnsignedTransaction {
    /// Serialized transaction without proofs; the message every input signs.
    pub fn bytes_to_sign(&self) -> Result<Vec<u8>, TransactionError> {
        ergo::to_ergo_unsigned(self)?
            .bytes_to_sign()
            .map_err(|e| TransactionError::Serialization(e.to_string()))
    }

    /// Transaction id (Blake2b-256 of [`bytes_to_sign`](Self::bytes_to_sign)).
    pub fn id(&self) -> Result<TxId, TransactionError> {
        Ok(ergo::from_tx_id(ergo::to_ergo_unsigned(self)?.id()))
    }

    /// Ids of the boxes being spent, in input order.
    pub fn input_ids(&self) -> Vec<BoxId> {
        self.inputs.iter().map(|i| i.box_id).collect()
    }

    /// Outputs with their final box ids.
    pub fn outputs(&self) -> Result<Vec<UnspentBox>, TransactionError> {
        let tx_id = self.id()?;
        self.output_candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let index = u16::try_from(i).map_err(|_| TransactionError::OutputIndexOverflow(i))?;
                c.to_box(tx_id, index)
            })
            .collect()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.output_candidates
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// Proof that an input's spending condition is satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendingProof {
    /// Raw proof bytes (a 56-byte Schnorr proof for P2PK inputs).
    pub proof_bytes: Vec<u8>,
    /// Context extension the proof was made with.
    pub extension: ContextExtension,
}

/// A signed input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    /// Box being spent.
    pub box_id: BoxId,
    /// Proof for this input.
    pub spending_proof: SpendingProof,
}

/// A transaction with spending proofs for every input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Transaction id (same as the unsigned transaction's id).
    pub id: TxId,
    /// Signed inputs.
    pub inputs: Vec<Input>,
    /// Read-only reference inputs.
    pub data_inputs: Vec<DataInput>,
    /// Outputs with box ids.
    pub outputs: Vec<UnspentBox>,
}
