//! Error types for the ergvault core.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid hex in {field}: {reason}")] InvalidHex { field: &'static str, reason: String },
    #[error("invalid length for {field}: expected {expected}, got {got}")] InvalidLength { field: &'static str, expected: usize, got: usize },
    #[error("duplicate token {0} in asset list")] DuplicateToken(String),
    #[error("unknown register key: {0}")] UnknownRegister(String),
    #[error("value overflow")] ValueOverflow,
    #[error("output index {0} does not fit in u16")] OutputIndexOverflow(usize),
    #[error("serialization: {0}")] Serialization(String),
    #[error("invalid ergo tree: {0}")] InvalidErgoTree(String),
    #[error("invalid box: {0}")] InvalidBox(String),
    #[error("box id {claimed} does not match contents (computed {computed})")] BoxIdMismatch { claimed: String, computed: String },
    #[error("invalid transaction: {0}")] InvalidTransaction(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid secret key bytes")] InvalidSecretKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address encoding: {0}")] InvalidEncoding(String),
    #[error("address has no owner script: {0}")] InvalidScript(String),
    #[error("network mismatch: expected {expected}, got {got}")] NetworkMismatch { expected: String, got: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("no inputs")] EmptyInputs,
    #[error("not enough coins: inputs {have}, outputs {need}")] NotEnoughCoins { have: u64, need: u64 },
    #[error("not enough of token {token_id}: inputs {have}, outputs {need}")] NotEnoughTokens { token_id: String, have: u64, need: u64 },
    #[error("change {change} below minimum box value {min}")] ChangeBelowMinimum { change: u64, min: u64 },
    #[error(transparent)] Transaction(#[from] TransactionError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    #[error("input box {0} not supplied to the prover")] MissingInputBox(String),
    #[error("input box {0} is not guarded by a public key")] UnsupportedScript(String),
    #[error("no secret for the key guarding input box {0}")] MissingSecret(String),
    #[error("data inputs are not supported")] DataInputsUnsupported,
    #[error("invalid state context: {0}")] StateContext(String),
    #[error("signing failed: {0}")] Signing(String),
    #[error(transparent)] Transaction(#[from] TransactionError),
}
