/// Bitcoin ledger client over an Esplora REST API (mempool.space,
/// blockstream.info, or a self-hosted electrs).
///
/// Anchor transactions spend one confirmed UTXO of the signer's P2PKH
/// address into an OP_RETURN output carrying the commitment plus change back
/// to the same address.
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, Network, PrivateKey, PublicKey};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;

use super::{BlockHeader, LedgerClient, PendingTransaction, TransactionReceipt};
use crate::crypto::sensitive::SecretString;
use crate::error::{ProofError, Result};

/// Flat fee for the one-input, two-output anchor transaction.
const ANCHOR_FEE_SATS: u64 = 5_000;
/// Smallest UTXO worth spending on an anchor.
const MIN_UTXO_SATS: u64 = 10_000;

/// Configuration for one Bitcoin network.
#[derive(Debug, Clone)]
pub struct BitcoinConfig {
    /// Esplora API base URL.
    pub api_url: String,
    /// Network: "mainnet", "testnet", or "signet".
    pub network: String,
    /// WIF private key. `None` disables transactions.
    pub wif_private_key: Option<SecretString>,
    /// Delay between confirmation polls.
    pub poll_interval: Duration,
}

pub struct BitcoinClient {
    client: Client,
    config: BitcoinConfig,
    signer: Option<(PrivateKey, PublicKey, Address)>,
}

#[derive(Debug, Deserialize)]
struct Utxo {
    txid: String,
    vout: u32,
    value: u64,
    status: UtxoStatus,
}

#[derive(Debug, Deserialize)]
struct UtxoStatus {
    confirmed: bool,
}

#[derive(Debug, Deserialize)]
struct EsploraBlock {
    id: String,
    height: u64,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct TxStatus {
    confirmed: bool,
    block_height: Option<u64>,
    block_hash: Option<String>,
    block_time: Option<i64>,
}

fn parse_network(name: &str) -> Network {
    match name {
        "mainnet" => Network::Bitcoin,
        "signet" => Network::Signet,
        "regtest" => Network::Regtest,
        _ => Network::Testnet,
    }
}

fn http_error(e: reqwest::Error) -> ProofError {
    ProofError::Ledger(format!("Esplora request failed: {e}"))
}

impl BitcoinClient {
    pub fn new(config: BitcoinConfig) -> Result<Self> {
        let network = parse_network(&config.network);
        let signer = match &config.wif_private_key {
            Some(wif) => {
                let secp = Secp256k1::new();
                let private_key = PrivateKey::from_wif(wif.expose())
                    .map_err(|e| ProofError::Config(format!("Invalid WIF key: {e}")))?;
                let public_key = PublicKey::from_private_key(&secp, &private_key);
                let address = Address::p2pkh(public_key, network);
                Some((private_key, public_key, address))
            }
            None => None,
        };

        Ok(Self {
            client: Client::new(),
            config,
            signer,
        })
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let resp = self
            .client
            .get(format!("{}{path}", self.config.api_url))
            .send()
            .await
            .map_err(http_error)?;

        if !resp.status().is_success() {
            return Err(ProofError::Ledger(format!(
                "Esplora GET {path} returned {}",
                resp.status()
            )));
        }

        resp.text().await.map_err(http_error)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get_text(path).await?;
        serde_json::from_str(&body)
            .map_err(|e| ProofError::Serialization(format!("Esplora {path} parse error: {e}")))
    }

    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        self.get_json(&format!("/address/{address}/utxo")).await
    }

    /// Build and sign a transaction with an OP_RETURN output containing `payload`.
    ///
    /// - Input: one confirmed UTXO from the anchor address
    /// - Output 0: OP_RETURN <payload> (0 sats, unspendable)
    /// - Output 1: change back to the anchor address (input - fee)
    async fn build_op_return_tx(&self, payload: &[u8]) -> Result<Vec<u8>> {
        use bitcoin::absolute::LockTime;
        use bitcoin::blockdata::opcodes::all::OP_RETURN;
        use bitcoin::blockdata::script::{Builder as ScriptBuilder, ScriptBuf};
        use bitcoin::hashes::Hash;
        use bitcoin::script::PushBytesBuf;
        use bitcoin::secp256k1::Message;
        use bitcoin::sighash::SighashCache;
        use bitcoin::transaction::Version;
        use bitcoin::{
            Amount, EcdsaSighashType, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
        };

        let (private_key, public_key, address) = self
            .signer
            .as_ref()
            .ok_or_else(|| ProofError::Ledger("No BTC signing key configured".into()))?;

        let utxos = self.utxos(&address.to_string()).await?;
        let utxo = utxos
            .iter()
            .find(|u| u.status.confirmed && u.value > MIN_UTXO_SATS)
            .ok_or_else(|| ProofError::Ledger("No suitable UTXO found for anchoring".into()))?;

        let change_amount = utxo.value - ANCHOR_FEE_SATS;

        let data = PushBytesBuf::try_from(payload.to_vec())
            .map_err(|e| ProofError::Ledger(format!("OP_RETURN payload too large: {e}")))?;
        let op_return_script = ScriptBuilder::new()
            .push_opcode(OP_RETURN)
            .push_slice(&data)
            .into_script();

        let prev_txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| ProofError::Ledger(format!("Invalid txid: {e}")))?;

        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(prev_txid, utxo.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::default(),
            }],
            output: vec![
                TxOut {
                    value: Amount::ZERO,
                    script_pubkey: op_return_script,
                },
                TxOut {
                    value: Amount::from_sat(change_amount),
                    script_pubkey: address.script_pubkey(),
                },
            ],
        };

        // Sign the transaction (P2PKH)
        let secp = Secp256k1::new();
        let script_pubkey = address.script_pubkey();
        let sighash_type = EcdsaSighashType::All;

        let sighash = SighashCache::new(&tx)
            .legacy_signature_hash(0, &script_pubkey, sighash_type.to_u32())
            .map_err(|e| ProofError::Signing(format!("Sighash error: {e}")))?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let sig = secp.sign_ecdsa(&msg, &private_key.inner);

        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(sighash_type.to_u32() as u8);

        let sig_push = PushBytesBuf::try_from(sig_bytes)
            .map_err(|e| ProofError::Signing(format!("Sig push bytes error: {e}")))?;
        let pubkey_push = PushBytesBuf::try_from(public_key.to_bytes())
            .map_err(|e| ProofError::Signing(format!("Pubkey push bytes error: {e}")))?;

        tx.input[0].script_sig = ScriptBuilder::new()
            .push_slice(&sig_push)
            .push_slice(&pubkey_push)
            .into_script();

        Ok(bitcoin::consensus::serialize(&tx))
    }

    async fn broadcast_tx(&self, raw_tx: &[u8]) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/tx", self.config.api_url))
            .body(hex::encode(raw_tx))
            .send()
            .await
            .map_err(http_error)?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProofError::Ledger(format!("Bitcoin broadcast failed: {body}")));
        }

        let txid = resp.text().await.map_err(http_error)?;
        Ok(txid.trim().to_string())
    }
}

#[async_trait]
impl LedgerClient for BitcoinClient {
    fn chain_name(&self) -> &str {
        "bitcoin"
    }

    fn signer_address(&self) -> Option<String> {
        self.signer.as_ref().map(|(_, _, address)| address.to_string())
    }

    async fn get_latest_block(&self) -> Result<BlockHeader> {
        let tip_hash = self.get_text("/blocks/tip/hash").await?;
        let block: EsploraBlock = self.get_json(&format!("/block/{}", tip_hash.trim())).await?;
        Ok(BlockHeader {
            number: block.height,
            hash: block.id,
            timestamp: block.timestamp,
        })
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        let utxos = self.utxos(address).await?;
        Ok(utxos
            .iter()
            .filter(|u| u.status.confirmed)
            .map(|u| u128::from(u.value))
            .sum())
    }

    async fn send_self_transaction(&self, payload: &[u8]) -> Result<PendingTransaction> {
        let raw_tx = self.build_op_return_tx(payload).await?;
        let tx_hash = self.broadcast_tx(&raw_tx).await?;
        Ok(PendingTransaction { tx_hash })
    }

    async fn wait_for_receipt(
        &self,
        pending: &PendingTransaction,
        timeout: Duration,
    ) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + timeout;

        loop {
            let status: TxStatus = self
                .get_json(&format!("/tx/{}/status", pending.tx_hash))
                .await?;

            if let TxStatus {
                confirmed: true,
                block_height: Some(number),
                block_hash: Some(hash),
                block_time: Some(timestamp),
            } = status
            {
                return Ok(TransactionReceipt {
                    tx_hash: pending.tx_hash.clone(),
                    block: BlockHeader {
                        number,
                        hash,
                        timestamp,
                    },
                    gas_used: Some(ANCHOR_FEE_SATS),
                });
            }

            if Instant::now() + self.config.poll_interval > deadline {
                return Err(ProofError::Ledger(format!(
                    "Transaction {} not confirmed within {timeout:?}",
                    pending.tx_hash
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
