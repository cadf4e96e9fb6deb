//! secp256k1 key material and pay-to-public-key scripts.
//!
//! Keys are ergo-lib discrete-log secrets. A P2PK owner script is
//! [`P2PK_TREE_PREFIX`] followed by the 33-byte compressed group element, the
//! same bytes ergo-lib produces for `Address::P2Pk(..).script()`.

use std::fmt;

use ergo_lib::ergotree_interpreter::sigma_protocol::private_input::DlogProverInput;
use ergo_lib::ergotree_interpreter::sigma_protocol::verifier::verify_signature;
use ergo_lib::ergotree_ir::chain::address::Address as ErgoAddress;
use ergo_lib::ergotree_ir::serialization::SigmaSerializable;
use ergo_lib::ergotree_ir::sigma_protocol::sigma_boolean::{ProveDlog, SigmaBoolean};
use ergo_lib::wallet::secret_key::SecretKey;

use crate::constants::P2PK_TREE_PREFIX;
use crate::error::CryptoError;
use crate::types::ErgoTree;

/// Length of a compressed secp256k1 point.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Discrete-log keypair for signing transactions.
///
/// The public half is computed once at construction.
#[derive(Clone)]
pub struct KeyPair {
    secret: DlogProverInput,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::from_input(DlogProverInput::random())
    }

    /// Create a keypair from a 32-byte big-endian scalar.
    ///
    /// Fails for scalars outside the group order.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let secret = DlogProverInput::from_bytes(&bytes).ok_or(CryptoError::InvalidSecretKey)?;
        Self::from_input(secret)
    }

    /// Wrap an ergo-lib secret.
    pub fn from_secret_key(secret: SecretKey) -> Result<Self, CryptoError> {
        match secret {
            SecretKey::DlogSecretKey(input) => Self::from_input(input),
            _ => Err(CryptoError::InvalidSecretKey),
        }
    }

    fn from_input(secret: DlogProverInput) -> Result<Self, CryptoError> {
        let public = PublicKey::from_image(secret.public_image())?;
        Ok(Self { secret, public })
    }

    /// The public key of this keypair.
    pub fn public_key(&self) -> PublicKey {
        self.public.clone()
    }

    /// Get the raw secret scalar bytes. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// The secret in the form ergo-lib's wallet signs with.
    pub fn to_secret_key(&self) -> SecretKey {
        SecretKey::DlogSecretKey(self.secret.clone())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public)
            .finish_non_exhaustive()
    }
}

/// Public key guarding P2PK boxes.
#[derive(Clone)]
pub struct PublicKey {
    image: ProveDlog,
    bytes: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    /// Parse a compressed point (33 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(CryptoError::InvalidPublicKey);
        }
        let image = ProveDlog::sigma_parse_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_image(image)
    }

    /// Wrap an ergo-lib `ProveDlog`.
    pub fn from_image(image: ProveDlog) -> Result<Self, CryptoError> {
        let encoded = image
            .sigma_serialize_bytes()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let bytes: [u8; PUBLIC_KEY_LEN] = encoded
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { image, bytes })
    }

    /// Compressed point bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.bytes
    }

    /// The ergo-lib proposition this key proves.
    pub fn image(&self) -> &ProveDlog {
        &self.image
    }

    /// The P2PK owner script for this key.
    pub fn p2pk_tree(&self) -> ErgoTree {
        let mut bytes = Vec::with_capacity(P2PK_TREE_PREFIX.len() + PUBLIC_KEY_LEN);
        bytes.extend_from_slice(&P2PK_TREE_PREFIX);
        bytes.extend_from_slice(&self.bytes);
        ErgoTree::from_bytes(bytes)
    }

    /// Verify a Schnorr proof of this key over `message`.
    pub fn verify(&self, message: &[u8], proof: &[u8]) -> Result<(), CryptoError> {
        if proof.is_empty() {
            return Err(CryptoError::InvalidSignature);
        }
        let proposition = SigmaBoolean::from(self.image.clone());
        match verify_signature(proposition, message, proof) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CryptoError::VerificationFailed),
            Err(_) => Err(CryptoError::InvalidSignature),
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.bytes))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

/// Extract the guarding public key if `tree` is a P2PK script.
pub fn p2pk_key(tree: &ErgoTree) -> Option<PublicKey> {
    let parsed = tree.parse().ok()?;
    match ErgoAddress::recreate_from_ergo_tree(&parsed).ok()? {
        ErgoAddress::P2Pk(image) => PublicKey::from_image(image).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAINNET_FEE_TREE;

    /// Public key of the scalar 1, the secp256k1 generator.
    const GENERATOR: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn scalar(last: u8) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[31] = last;
        bytes
    }

    #[test]
    fn keypair_from_secret_deterministic() {
        let kp1 = KeyPair::from_secret_bytes([42u8; 32]).unwrap();
        let kp2 = KeyPair::from_secret_bytes([42u8; 32]).unwrap();
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.secret_bytes(), kp2.secret_bytes());
    }

    #[test]
    fn scalar_one_is_generator() {
        let pk = KeyPair::from_secret_bytes(scalar(1)).unwrap().public_key();
        assert_eq!(pk.to_string(), GENERATOR);
        assert_eq!(pk.p2pk_tree().to_hex(), format!("0008cd{GENERATOR}"));
    }

    #[test]
    fn scalar_above_order_rejected() {
        assert_eq!(
            KeyPair::from_secret_bytes([0xFF; 32]).unwrap_err(),
            CryptoError::InvalidSecretKey
        );
    }

    #[test]
    fn keypair_generate_unique() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn keypair_debug_hides_secret() {
        let kp = KeyPair::generate().unwrap();
        let debug = format!("{kp:?}");
        assert!(debug.contains("public_key"));
        assert!(!debug.contains(&hex::encode(kp.secret_bytes())));
    }

    #[test]
    fn public_key_bytes_roundtrip() {
        let pk = KeyPair::from_secret_bytes([3u8; 32]).unwrap().public_key();
        assert_eq!(PublicKey::from_bytes(&pk.to_bytes()).unwrap(), pk);
        assert_eq!(
            PublicKey::from_bytes(&pk.to_bytes()[..32]).unwrap_err(),
            CryptoError::InvalidPublicKey
        );
    }

    #[test]
    fn p2pk_tree_matches_ergo_lib_script() {
        let pk = KeyPair::from_secret_bytes([3u8; 32]).unwrap().public_key();
        let script = ErgoAddress::P2Pk(pk.image().clone()).script().unwrap();
        assert_eq!(script.sigma_serialize_bytes().unwrap(), pk.p2pk_tree().as_bytes());
        assert_eq!(pk.p2pk_tree().as_bytes().len(), 36);
        assert_eq!(p2pk_key(&pk.p2pk_tree()), Some(pk));
    }

    #[test]
    fn p2pk_key_rejects_other_scripts() {
        let fee = ErgoTree::from_hex(MAINNET_FEE_TREE).unwrap();
        assert!(p2pk_key(&fee).is_none());
        let mut bytes = P2PK_TREE_PREFIX.to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(p2pk_key(&ErgoTree::from_bytes(bytes)).is_none());
    }

    #[test]
    fn verify_rejects_empty_and_garbage_proofs() {
        let pk = KeyPair::from_secret_bytes([1u8; 32]).unwrap().public_key();
        assert_eq!(pk.verify(b"message", &[]).unwrap_err(), CryptoError::InvalidSignature);
        assert!(pk.verify(b"message", &[7u8; 56]).is_err());
    }
}
