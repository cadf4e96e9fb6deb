//! Connector facade: the operations exposed to third-party callers.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use erg_core::prover::TxProver;
use erg_core::types::{BoxId, TokenId, UnspentBox};
use erg_wallet::{AddressedUtxo, EncryptedRootKey, ExtendedKey, Signer, WalletError};

use crate::error::ConnectorError;
use crate::wire::{WireBox, WireSignedTx, WireUnsignedTx};

/// Token name callers use for the native asset.
pub const NATIVE_TOKEN: &str = "ERG";

/// The wallet state the connector reads and the key it unlocks.
pub trait WalletBackend: Send + Sync {
    /// Tracked native balance in nanoERG.
    fn native_balance(&self) -> Result<u64, WalletError>;

    /// Wallet UTXOs in wallet order.
    fn utxos(&self) -> &[AddressedUtxo];

    /// Decrypt the root signing key.
    fn unlock_root_key(&self, password: &[u8]) -> Result<ExtendedKey, WalletError>;
}

/// Backend over a fixed UTXO set and an encrypted root key.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    utxos: Vec<AddressedUtxo>,
    root_key: EncryptedRootKey,
}

impl LocalWallet {
    /// Wallet holding `utxos`, signing with `root_key`.
    pub fn new(utxos: Vec<AddressedUtxo>, root_key: EncryptedRootKey) -> Self {
        Self { utxos, root_key }
    }
}

impl WalletBackend for LocalWallet {
    fn native_balance(&self) -> Result<u64, WalletError> {
        self.utxos.iter().try_fold(0u64, |acc, u| {
            acc.checked_add(u.utxo.value).ok_or_else(|| {
                WalletError::InvalidAmount("native balance overflows u64".into())
            })
        })
    }

    fn utxos(&self) -> &[AddressedUtxo] {
        &self.utxos
    }

    fn unlock_root_key(&self, password: &[u8]) -> Result<ExtendedKey, WalletError> {
        self.root_key.unlock(password)
    }
}

/// Connector over a wallet backend and a prover.
pub struct Connector<B, P> {
    backend: B,
    signer: Signer<P>,
}

impl<B: WalletBackend, P: TxProver> Connector<B, P> {
    /// Connector reading `backend` and signing with `prover`.
    pub fn new(backend: B, prover: P) -> Self {
        Self {
            backend,
            signer: Signer::new(prover),
        }
    }

    /// The wallet backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Balance of `token`: [`NATIVE_TOKEN`] or a hex token id.
    ///
    /// Token balances are summed over the wallet's UTXOs.
    pub fn get_balance(&self, token: &str) -> Result<u64, ConnectorError> {
        if token == NATIVE_TOKEN {
            return Ok(self.backend.native_balance()?);
        }
        let token_id: TokenId = token
            .parse()
            .map_err(|e| ConnectorError::parse("tokenId", e))?;
        self.backend
            .utxos()
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.utxo.token_amount(&token_id)))
            .ok_or_else(|| {
                ConnectorError::Wallet(WalletError::InvalidAmount(format!(
                    "balance of token {token_id} overflows u64"
                )))
            })
    }

    /// Wallet UTXOs in wire format.
    ///
    /// With a hint, returns the shortest prefix in wallet order whose value
    /// reaches the hint, or every UTXO when the hint is never reached.
    pub fn list_utxos(&self, value_hint: Option<u64>) -> Vec<WireBox> {
        let utxos = self.backend.utxos();
        let Some(hint) = value_hint else {
            return utxos.iter().map(|u| WireBox::from(&u.utxo)).collect();
        };
        let mut acc: u64 = 0;
        let mut out = Vec::new();
        for u in utxos {
            if acc >= hint {
                break;
            }
            acc = acc.saturating_add(u.utxo.value);
            out.push(WireBox::from(&u.utxo));
        }
        debug!(hint, returned = out.len(), total = utxos.len(), "listed utxos");
        out
    }

    /// Sign an externally built transaction.
    ///
    /// Keys are derived only for the inputs named by `input_indices`, which
    /// must refer to boxes among `candidate_utxos`. Every candidate spent by
    /// the transaction is handed to the prover.
    pub fn sign_transaction(
        &self,
        password: &[u8],
        candidate_utxos: &[AddressedUtxo],
        tx_json: &str,
        input_indices: &[usize],
    ) -> Result<WireSignedTx, ConnectorError> {
        let tx = WireUnsignedTx::parse(tx_json).inspect_err(|e| {
            warn!(error = %e, "rejected malformed transaction");
        })?;
        if !tx.data_inputs.is_empty() {
            warn!(data_inputs = tx.data_inputs.len(), "rejected transaction with data inputs");
            return Err(WalletError::UnsupportedFeature(format!(
                "transaction references {} data inputs",
                tx.data_inputs.len()
            ))
            .into());
        }

        let candidates: HashMap<BoxId, &AddressedUtxo> = candidate_utxos
            .iter()
            .map(|u| (u.utxo.box_id, u))
            .collect();

        let mut senders = Vec::with_capacity(input_indices.len());
        for &index in input_indices {
            let input = tx.inputs.get(index).ok_or_else(|| {
                warn!(index, inputs = tx.inputs.len(), "input index out of range");
                ConnectorError::InvalidInputIndex {
                    index,
                    inputs: tx.inputs.len(),
                }
            })?;
            let utxo = candidates.get(&input.box_id).ok_or_else(|| {
                ConnectorError::AssertionFailure(format!(
                    "input {index} spends box {} which is not among the candidates",
                    input.box_id
                ))
            })?;
            senders.push((*utxo).clone());
        }

        let boxes_to_spend: Vec<UnspentBox> = tx
            .inputs
            .iter()
            .filter_map(|i| candidates.get(&i.box_id).map(|u| u.utxo.clone()))
            .collect();

        let root = self.backend.unlock_root_key(password)?;
        let signed = self
            .signer
            .sign_unsigned(&tx, &senders, boxes_to_spend, &root)?;
        info!(tx_id = %signed.id, signed_inputs = senders.len(), "connector signed transaction");
        WireSignedTx::try_from(&signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erg_core::crypto::KeyPair;
    use erg_core::prover::ErgoProver;
    use erg_core::types::{Hash256, Registers, Token};
    use erg_wallet::keys::{derive_for_addressing, Seed};
    use erg_wallet::Addressing;

    fn seed() -> Seed {
        Seed::from_bytes([3u8; 64])
    }

    fn root() -> ExtendedKey {
        ExtendedKey::master(&seed()).unwrap()
    }

    fn utxo(id: u8, value: u64, assets: Vec<Token>) -> AddressedUtxo {
        let addressing = Addressing::bip44(0, 0, u32::from(id % 2));
        let kp = derive_for_addressing(&root(), &addressing).unwrap();
        AddressedUtxo {
            utxo: UnspentBox::new(
                value,
                kp.public_key().p2pk_tree(),
                1,
                assets,
                Registers::new(),
                Hash256([id; 32]),
                0,
            )
            .unwrap(),
            addressing,
        }
    }

    fn token(amount: u64) -> Token {
        Token {
            token_id: Hash256([7; 32]),
            amount,
        }
    }

    fn connector(utxos: Vec<AddressedUtxo>) -> Connector<LocalWallet, ErgoProver> {
        let sealed = EncryptedRootKey::seal(&seed(), &[], b"pw").unwrap();
        Connector::new(LocalWallet::new(utxos, sealed), ErgoProver)
    }

    /// A transaction spending `ids` into one output worth `value`.
    fn spend_json(ids: &[BoxId], value: u64) -> String {
        let inputs: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({ "boxId": id.to_string() }))
            .collect();
        let receiver = KeyPair::from_secret_bytes([0xAA; 32]).unwrap().public_key();
        serde_json::json!({
            "inputs": inputs,
            "dataInputs": [],
            "outputs": [{
                "value": value.to_string(),
                "ergoTree": receiver.p2pk_tree().to_hex(),
                "creationHeight": 10,
            }]
        })
        .to_string()
    }

    fn ids(utxos: &[AddressedUtxo]) -> Vec<BoxId> {
        utxos.iter().map(|u| u.utxo.box_id).collect()
    }

    #[test]
    fn balances() {
        let c = connector(vec![
            utxo(1, 2_000_000, vec![token(5)]),
            utxo(2, 3_000_000, vec![]),
            utxo(3, 1_000_000, vec![token(7)]),
        ]);
        assert_eq!(c.get_balance(NATIVE_TOKEN).unwrap(), 6_000_000);
        assert_eq!(c.get_balance(&Hash256([7; 32]).to_string()).unwrap(), 12);
        assert_eq!(c.get_balance(&Hash256([8; 32]).to_string()).unwrap(), 0);
        assert!(matches!(
            c.get_balance("not-a-token").unwrap_err(),
            ConnectorError::Parse { field: "tokenId", .. }
        ));
    }

    #[test]
    fn native_balance_overflow_reported() {
        let mut huge = utxo(2, 1_000_000, vec![]);
        huge.utxo.value = u64::MAX;
        let c = connector(vec![utxo(1, 1_000_000, vec![]), huge]);
        assert!(matches!(
            c.backend().native_balance().unwrap_err(),
            WalletError::InvalidAmount(_)
        ));
        assert!(matches!(
            c.get_balance(NATIVE_TOKEN).unwrap_err(),
            ConnectorError::Wallet(WalletError::InvalidAmount(_))
        ));
    }

    #[test]
    fn list_utxos_prefix() {
        let c = connector(vec![
            utxo(1, 2_000_000, vec![]),
            utxo(2, 3_000_000, vec![]),
            utxo(3, 1_000_000, vec![]),
        ]);
        assert_eq!(c.list_utxos(None).len(), 3);
        assert_eq!(c.list_utxos(Some(2_000_000)).len(), 1);
        assert_eq!(c.list_utxos(Some(2_000_001)).len(), 2);
        assert_eq!(c.list_utxos(Some(100_000_000)).len(), 3);
        assert!(c.list_utxos(Some(0)).is_empty());
        let first = &c.list_utxos(Some(1))[0];
        assert_eq!(first.box_id, c.backend().utxos()[0].utxo.box_id.to_string());
    }

    #[test]
    fn signs_selected_inputs() {
        let utxos = vec![utxo(1, 2_000_000, vec![]), utxo(2, 3_000_000, vec![])];
        let c = connector(utxos.clone());
        let signed = c
            .sign_transaction(b"pw", &utxos, &spend_json(&ids(&utxos), 5_000_000), &[0, 1])
            .unwrap();
        assert_eq!(signed.inputs.len(), 2);
        let tx = erg_wallet::SignedTx::try_from(&signed).unwrap();
        let spent: Vec<_> = utxos.iter().map(|u| u.utxo.clone()).collect();
        tx.verify(&spent).unwrap();
    }

    #[test]
    fn index_out_of_range() {
        let utxos = vec![utxo(1, 2_000_000, vec![])];
        let err = connector(utxos.clone())
            .sign_transaction(b"pw", &utxos, &spend_json(&ids(&utxos), 2_000_000), &[1])
            .unwrap_err();
        assert_eq!(err, ConnectorError::InvalidInputIndex { index: 1, inputs: 1 });
    }

    #[test]
    fn referenced_box_missing_from_candidates() {
        let utxos = vec![utxo(1, 2_000_000, vec![])];
        let err = connector(utxos.clone())
            .sign_transaction(
                b"pw",
                &utxos,
                &spend_json(&[utxos[0].utxo.box_id, Hash256([9; 32])], 2_000_000),
                &[0, 1],
            )
            .unwrap_err();
        assert!(matches!(err, ConnectorError::AssertionFailure(_)));
    }

    #[test]
    fn wrong_password() {
        let utxos = vec![utxo(1, 2_000_000, vec![])];
        let err = connector(utxos.clone())
            .sign_transaction(b"nope", &utxos, &spend_json(&ids(&utxos), 2_000_000), &[0])
            .unwrap_err();
        assert_eq!(err, ConnectorError::Wallet(WalletError::InvalidPassword));
    }

    #[test]
    fn data_inputs_rejected() {
        let utxos = vec![utxo(1, 2_000_000, vec![])];
        let mut json: serde_json::Value =
            serde_json::from_str(&spend_json(&ids(&utxos), 2_000_000)).unwrap();
        json["dataInputs"] = serde_json::json!([{ "boxId": Hash256([5; 32]).to_string() }]);
        let err = connector(utxos.clone())
            .sign_transaction(b"pw", &utxos, &json.to_string(), &[0])
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Wallet(WalletError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn malformed_tx() {
        let utxos = vec![utxo(1, 2_000_000, vec![])];
        let err = connector(utxos.clone())
            .sign_transaction(b"pw", &utxos, "{}", &[0])
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Parse { .. }));
    }
}
