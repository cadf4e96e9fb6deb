//! Shared test helpers for integration and property tests.

use erg_core::constants::{NetworkType, MAINNET_FEE_TREE, SAFE_USER_MIN};
use erg_core::crypto::KeyPair;
use erg_core::types::{ErgoTree, Hash256, Registers, Token, UnspentBox};
use erg_wallet::keys::derive_for_addressing;
use erg_wallet::{AddressedUtxo, Addressing, ExtendedKey, ProtocolParams, Receiver, Seed};

/// Root key of a test wallet derived from a one-byte seed.
pub fn root(seed: u8) -> ExtendedKey {
    ExtendedKey::master(&Seed::from_bytes([seed; 64])).unwrap()
}

/// External-chain addressing of address `index` in account 0.
pub fn addressing(index: u32) -> Addressing {
    Addressing::bip44(0, 0, index)
}

/// P2PK owner script of address `index` under `root`.
pub fn owner(root: &ExtendedKey, index: u32) -> ErgoTree {
    derive_for_addressing(root, &addressing(index))
        .unwrap()
        .public_key()
        .p2pk_tree()
}

/// P2PK owner script that belongs to nobody in the tests.
pub fn foreign_tree(tag: u8) -> ErgoTree {
    let mut scalar = [0x5A; 32];
    scalar[31] = tag;
    KeyPair::from_secret_bytes(scalar)
        .unwrap()
        .public_key()
        .p2pk_tree()
}

/// Token with id `[id; 32]`.
pub fn token(id: u8, amount: u64) -> Token {
    Token {
        token_id: Hash256([id; 32]),
        amount,
    }
}

/// Box owned by address `index` of `root`, created by a transaction whose id
/// is derived from `nonce`.
pub fn utxo(
    root: &ExtendedKey,
    nonce: u64,
    index: u32,
    value: u64,
    assets: Vec<Token>,
) -> AddressedUtxo {
    let mut tx_id = [0u8; 32];
    tx_id[..8].copy_from_slice(&nonce.to_le_bytes());
    AddressedUtxo {
        utxo: UnspentBox::new(
            value,
            owner(root, index),
            1,
            assets,
            Registers::new(),
            Hash256(tx_id),
            0,
        )
        .unwrap(),
        addressing: addressing(index),
    }
}

/// Mainnet parameters paying fees to the miner fee contract.
pub fn params() -> ProtocolParams {
    params_with_min(SAFE_USER_MIN)
}

/// Mainnet parameters with a custom minimum box value.
pub fn params_with_min(minimum_box_value: u64) -> ProtocolParams {
    ProtocolParams {
        fee_address: ErgoTree::from_hex(MAINNET_FEE_TREE).unwrap(),
        minimum_box_value,
        network: NetworkType::Mainnet,
    }
}

/// Wallet-owned change receiver at the internal chain of account 0.
pub fn change_receiver(root: &ExtendedKey) -> Receiver {
    let addressing = Addressing::bip44(0, 1, 0);
    let tree = derive_for_addressing(root, &addressing)
        .unwrap()
        .public_key()
        .p2pk_tree();
    Receiver {
        address: tree,
        addressing: Some(addressing),
    }
}

/// Receiver outside the wallet.
pub fn external_receiver(tag: u8) -> Receiver {
    Receiver {
        address: foreign_tree(tag),
        addressing: None,
    }
}

/// Sum of `token_id` across the given asset lists.
pub fn token_sum<'a>(token_id: &Hash256, assets: impl IntoIterator<Item = &'a [Token]>) -> u64 {
    assets
        .into_iter()
        .flat_map(|a| a.iter())
        .filter(|t| t.token_id == *token_id)
        .map(|t| t.amount)
        .sum()
}
