//! CLI configuration loaded from environment variables.

use anyhow::{anyhow, Context, Result};
use erg_core::constants::{NetworkType, DEFAULT_FEE, MAINNET_FEE_TREE, SAFE_USER_MIN};
use erg_core::types::ErgoTree;
use erg_wallet::ProtocolParams;

#[derive(Clone, Debug)]
pub struct CliConfig {
    /// Network addresses are parsed and shown for.
    pub network: NetworkType,
    /// Default miner fee in nanoERG.
    pub fee: u64,
    /// Smallest box value the wallet creates.
    pub minimum_box_value: u64,
    /// Creation height stamped on new boxes.
    pub height: u32,
    /// Owner script collecting the fee.
    pub fee_address: ErgoTree,
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let network = match lookup("ERG_NETWORK") {
            Some(s) => s.parse().map_err(|e| anyhow!("ERG_NETWORK: {e}"))?,
            None => NetworkType::Mainnet,
        };

        let fee: u64 = lookup("ERG_FEE")
            .unwrap_or_else(|| DEFAULT_FEE.to_string())
            .parse()
            .context("ERG_FEE must be a non-negative integer")?;

        let minimum_box_value: u64 = lookup("ERG_MIN_BOX_VALUE")
            .unwrap_or_else(|| SAFE_USER_MIN.to_string())
            .parse()
            .context("ERG_MIN_BOX_VALUE must be a non-negative integer")?;

        let height: u32 = lookup("ERG_HEIGHT")
            .unwrap_or_else(|| "0".to_string())
            .parse()
            .context("ERG_HEIGHT must be a block height")?;

        let fee_address = ErgoTree::from_hex(
            &lookup("ERG_FEE_ADDRESS").unwrap_or_else(|| MAINNET_FEE_TREE.to_string()),
        )
        .context("ERG_FEE_ADDRESS must be a hex-encoded ErgoTree")?;

        Ok(CliConfig {
            network,
            fee,
            minimum_box_value,
            height,
            fee_address,
        })
    }

    /// Protocol parameters for one drafting call.
    pub fn protocol_params(&self) -> ProtocolParams {
        ProtocolParams {
            fee_address: self.fee_address.clone(),
            minimum_box_value: self.minimum_box_value,
            network: self.network,
        }
    }
}
