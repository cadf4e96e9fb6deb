//! Protocol constants. All monetary values in nanoERG (1 ERG = 10^9 nanoERG).

use ergo_lib::ergotree_ir::chain::address::NetworkPrefix;

/// nanoERG per ERG.
pub const COIN: u64 = 1_000_000_000;

/// Decimal places of the native asset.
pub const ERG_DECIMALS: u8 = 9;

/// Smallest box value the wallet will create for its own outputs.
///
/// Boxes below this value are rejected by miners for storage rent reasons.
pub const SAFE_USER_MIN: u64 = 1_000_000;

/// Default transaction fee offered to miners.
pub const DEFAULT_FEE: u64 = 1_100_000;

/// BIP-44 coin type registered for Ergo.
pub const ERGO_COIN_TYPE: u32 = 429;

/// Bit marking a hardened derivation index.
pub const HARDENED: u32 = 0x8000_0000;

/// Owner script prefix of a pay-to-public-key box.
///
/// A P2PK tree is this header followed by the 33-byte compressed public key.
pub const P2PK_TREE_PREFIX: [u8; 3] = [0x00, 0x08, 0xcd];

/// Miner fee contract on mainnet (hex-encoded tree).
pub const MAINNET_FEE_TREE: &str = "1005040004000e36100204a00b08cd0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798ea02d192a39a8cc7a701730073011001020402d19683030193a38cc7b2a57300000193c2b2a57301007473027303830108cdeeac93b1a57304";

/// Register keys a box may carry in `additionalRegisters`.
pub const REGISTER_KEYS: [&str; 6] = ["R4", "R5", "R6", "R7", "R8", "R9"];

/// Network a wallet operates on.
///
/// # Examples
///
/// ```
/// use erg_core::constants::NetworkType;
/// assert_eq!(NetworkType::default(), NetworkType::Mainnet);
/// assert_eq!(NetworkType::Testnet.address_prefix() as u8, 0x10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
}

impl NetworkType {
    /// The ergo-lib network prefix used when encoding addresses.
    pub fn address_prefix(&self) -> NetworkPrefix {
        match self {
            Self::Mainnet => NetworkPrefix::Mainnet,
            Self::Testnet => NetworkPrefix::Testnet,
        }
    }

    /// Network of a decoded address prefix.
    pub fn from_address_prefix(prefix: NetworkPrefix) -> Self {
        match prefix {
            NetworkPrefix::Mainnet => Self::Mainnet,
            NetworkPrefix::Testnet => Self::Testnet,
        }
    }
}

impl std::str::FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_exceeds_min_box_value() {
        assert!(DEFAULT_FEE > SAFE_USER_MIN);
    }

    #[test]
    fn network_prefix_roundtrip() {
        for net in [NetworkType::Mainnet, NetworkType::Testnet] {
            assert_eq!(NetworkType::from_address_prefix(net.address_prefix()), net);
        }
        assert_eq!(NetworkType::Mainnet.address_prefix() as u8, 0x00);
    }

    #[test]
    fn network_parse() {
        assert_eq!("Mainnet".parse::<NetworkType>().unwrap(), NetworkType::Mainnet);
        assert_eq!("testnet".parse::<NetworkType>().unwrap(), NetworkType::Testnet);
        assert!("regtest".parse::<NetworkType>().is_err());
    }

    #[test]
    fn fee_tree_parses() {
        let tree = crate::types::ErgoTree::from_hex(MAINNET_FEE_TREE).unwrap();
        assert!(tree.parse().is_ok());
    }
}
