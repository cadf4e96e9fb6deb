//! Human-readable addresses.
//!
//! Encoding and decoding are ergo-lib's [`AddressEncoder`]: Base58 of
//! `prefix || content || checksum` with a Blake2b-256 checksum, where the
//! prefix combines the network and the address type (P2PK, P2SH or P2S).
//!
//! Every owner script maps to exactly one address per network.

use ergo_lib::ergotree_ir::chain::address::{Address as ErgoAddress, AddressEncoder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::NetworkType;
use crate::crypto::PublicKey;
use crate::error::AddressError;
use crate::types::ErgoTree;

/// A network-qualified address.
#[derive(Clone, Debug)]
pub struct Address {
    network: NetworkType,
    inner: ErgoAddress,
    encoded: String,
}

impl Address {
    fn wrap(inner: ErgoAddress, network: NetworkType) -> Self {
        let encoded = AddressEncoder::encode_address_as_string(network.address_prefix(), &inner);
        Self {
            network,
            inner,
            encoded,
        }
    }

    /// Address paying to a public key.
    pub fn p2pk(public_key: PublicKey, network: NetworkType) -> Self {
        Self::wrap(ErgoAddress::P2Pk(public_key.image().clone()), network)
    }

    /// Address for an owner script.
    ///
    /// P2PK scripts yield a P2PK address; anything ergo-lib cannot
    /// recognise is kept as a pay-to-script address over the raw bytes.
    pub fn from_ergo_tree(tree: &ErgoTree, network: NetworkType) -> Self {
        let inner = tree
            .parse()
            .ok()
            .and_then(|parsed| ErgoAddress::recreate_from_ergo_tree(&parsed).ok())
            .unwrap_or_else(|| ErgoAddress::P2S(tree.as_bytes().to_vec()));
        Self::wrap(inner, network)
    }

    /// The owner script this address pays to.
    pub fn ergo_tree(&self) -> Result<ErgoTree, AddressError> {
        if let ErgoAddress::P2S(bytes) = &self.inner {
            return Ok(ErgoTree::from_bytes(bytes.clone()));
        }
        let script = self
            .inner
            .script()
            .map_err(|e| AddressError::InvalidScript(e.to_string()))?;
        ErgoTree::from_parsed(&script).map_err(|e| AddressError::InvalidScript(e.to_string()))
    }

    /// The key a P2PK address pays to.
    pub fn public_key(&self) -> Option<PublicKey> {
        match &self.inner {
            ErgoAddress::P2Pk(image) => PublicKey::from_image(image.clone()).ok(),
            _ => None,
        }
    }

    /// The network this address belongs to.
    pub fn network(&self) -> NetworkType {
        self.network
    }

    /// The ergo-lib address.
    pub fn as_ergo(&self) -> &ErgoAddress {
        &self.inner
    }

    /// Decode and require a specific network.
    pub fn parse_for(s: &str, network: NetworkType) -> Result<Self, AddressError> {
        let addr: Self = s.parse()?;
        if addr.network != network {
            return Err(AddressError::NetworkMismatch {
                expected: network.to_string(),
                got: addr.network.to_string(),
            });
        }
        Ok(addr)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Address {}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = AddressEncoder::unchecked_parse_network_address_from_str(s)
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;
        let network = NetworkType::from_address_prefix(decoded.network());
        Ok(Self::wrap(decoded.address(), network))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
