/// Ethereum ledger client.
///
/// Head reads and balances go through raw JSON-RPC. Anchor transactions are
/// legacy transactions sent to the signer's own address with the commitment
/// as calldata, signed locally with alloy.
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;

use super::{BlockHeader, LedgerClient, PendingTransaction, TransactionReceipt};
use crate::crypto::sensitive::SecretString;
use crate::error::{ProofError, Result};

/// Gas for a transfer to self with 32 bytes of calldata, plus headroom.
const ANCHOR_GAS_LIMIT: u64 = 25_000;

/// Configuration for one Ethereum network.
#[derive(Debug, Clone)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint (e.g., Infura, Alchemy, local node).
    pub rpc_url: String,
    /// Chain ID (1 for mainnet, 11155111 for Sepolia).
    pub chain_id: u64,
    /// Hex private key (with or without 0x). `None` disables transactions.
    pub private_key: Option<SecretString>,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
}

pub struct EthereumClient {
    config: EthereumConfig,
    client: Client,
    signer: Option<PrivateKeySigner>,
}

/// Simplified JSON-RPC response.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    number: String,
    hash: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    block_number: Option<String>,
    status: Option<String>,
    gas_used: Option<String>,
}

/// Parse a 0x-prefixed hex quantity.
fn parse_quantity(value: &str) -> Result<u128> {
    u128::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| ProofError::Ledger(format!("Invalid hex quantity '{value}': {e}")))
}

fn parse_u64(value: &str) -> Result<u64> {
    u64::try_from(parse_quantity(value)?)
        .map_err(|_| ProofError::Ledger(format!("Quantity out of range: {value}")))
}

impl RpcBlock {
    fn into_header(self) -> Result<BlockHeader> {
        Ok(BlockHeader {
            number: parse_u64(&self.number)?,
            hash: self.hash,
            timestamp: parse_u64(&self.timestamp)? as i64,
        })
    }
}

impl EthereumClient {
    pub fn new(config: EthereumConfig) -> Result<Self> {
        let signer = config
            .private_key
            .as_ref()
            .map(|key| {
                key.expose()
                    .trim_start_matches("0x")
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| ProofError::Config(format!("Invalid ETH private key: {e}")))
            })
            .transpose()?;

        Ok(Self {
            config,
            client: Client::new(),
            signer,
        })
    }

    /// Send a JSON-RPC request. A `null` result is `Ok(None)`.
    async fn rpc_call_opt<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp: JsonRpcResponse<T> = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProofError::Ledger(format!("ETH RPC {method} request failed: {e}")))?
            .json()
            .await
            .map_err(|e| ProofError::Serialization(format!("RPC response parse error: {e}")))?;

        if let Some(err) = resp.error {
            return Err(ProofError::Ledger(format!(
                "ETH RPC {method} error: {}",
                err.message
            )));
        }

        Ok(resp.result)
    }

    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        self.rpc_call_opt(method, params)
            .await?
            .ok_or_else(|| ProofError::Ledger(format!("Empty RPC response for {method}")))
    }

    async fn block_by_number(&self, number: &str) -> Result<BlockHeader> {
        let block: RpcBlock = self
            .rpc_call("eth_getBlockByNumber", serde_json::json!([number, false]))
            .await?;
        block.into_header()
    }

    /// Build, sign, and send a transaction to self with `payload` as calldata.
    async fn send_anchor_tx(&self, signer: &PrivateKeySigner, payload: &[u8]) -> Result<String> {
        use alloy::consensus::SignableTransaction;
        use alloy::primitives::{Bytes, U256};
        use alloy::signers::Signer;

        let from_address = signer.address();

        let nonce_hex: String = self
            .rpc_call(
                "eth_getTransactionCount",
                serde_json::json!([format!("{from_address:?}"), "pending"]),
            )
            .await?;
        let nonce = parse_u64(&nonce_hex)?;

        let gas_price_hex: String = self.rpc_call("eth_gasPrice", serde_json::json!([])).await?;
        let gas_price = parse_quantity(&gas_price_hex)?;

        let tx = alloy::consensus::TxLegacy {
            chain_id: Some(self.config.chain_id),
            nonce,
            gas_price,
            gas_limit: ANCHOR_GAS_LIMIT,
            to: alloy::primitives::TxKind::Call(from_address),
            value: U256::ZERO,
            input: Bytes::copy_from_slice(payload),
        };

        let sig_hash = tx.signature_hash();
        let sig = signer
            .sign_hash(&sig_hash)
            .await
            .map_err(|e| ProofError::Signing(format!("ETH signing failed: {e}")))?;

        let signed = alloy::consensus::TxEnvelope::Legacy(tx.into_signed(sig));

        let mut raw_tx = Vec::new();
        alloy::eips::eip2718::Encodable2718::encode_2718(&signed, &mut raw_tx);
        let raw_hex = format!("0x{}", hex::encode(&raw_tx));

        self.rpc_call("eth_sendRawTransaction", serde_json::json!([raw_hex]))
            .await
    }
}

#[async_trait]
impl LedgerClient for EthereumClient {
    fn chain_name(&self) -> &str {
        "ethereum"
    }

    fn signer_address(&self) -> Option<String> {
        self.signer.as_ref().map(|s| format!("{:?}", s.address()))
    }

    async fn get_latest_block(&self) -> Result<BlockHeader> {
        self.block_by_number("latest").await
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        let balance_hex: String = self
            .rpc_call("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        parse_quantity(&balance_hex)
    }

    async fn send_self_transaction(&self, payload: &[u8]) -> Result<PendingTransaction> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| ProofError::Ledger("No ETH signing key configured".into()))?;
        let tx_hash = self.send_anchor_tx(signer, payload).await?;
        Ok(PendingTransaction { tx_hash })
    }

    async fn wait_for_receipt(
        &self,
        pending: &PendingTransaction,
        timeout: Duration,
    ) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + timeout;

        loop {
            let receipt: Option<RpcReceipt> = self
                .rpc_call_opt(
                    "eth_getTransactionReceipt",
                    serde_json::json!([&pending.tx_hash]),
                )
                .await?;

            if let Some(RpcReceipt {
                block_number: Some(block_number),
                status,
                gas_used,
            }) = receipt
            {
                if status.as_deref() == Some("0x0") {
                    return Err(ProofError::Ledger(format!(
                        "Transaction {} reverted",
                        pending.tx_hash
                    )));
                }
                let block = self.block_by_number(&block_number).await?;
                return Ok(TransactionReceipt {
                    tx_hash: pending.tx_hash.clone(),
                    block,
                    gas_used: gas_used.as_deref().map(parse_u64).transpose()?,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn config(private_key: Option<&str>) -> EthereumConfig {
        EthereumConfig {
            rpc_url: "http://127.0.0.1:8545".into(),
            chain_id: 11_155_111,
            private_key: private_key.map(SecretString::new),
            poll_interval: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_rpc_block_into_header() {
        let block: RpcBlock = serde_json::from_value(serde_json::json!({
            "number": "0x121eac0",
            "hash": "0xdeadbeef",
            "timestamp": "0x6553f100",
            "transactions": []
        }))
        .unwrap();
        let header = block.into_header().unwrap();
        assert_eq!(header.number, 19_000_000);
        assert_eq!(header.hash, "0xdeadbeef");
        assert_eq!(header.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_no_key_means_no_signer() {
        let client = EthereumClient::new(config(None)).unwrap();
        assert!(client.signer_address().is_none());
    }

    #[test]
    fn test_signer_address_from_key() {
        // Well-known development key (anvil/hardhat account #0)
        let client = EthereumClient::new(config(Some(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )))
        .unwrap();
        assert_eq!(
            client.signer_address().unwrap().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(matches!(
            EthereumClient::new(config(Some("not a key"))),
            Err(ProofError::Config(_))
        ));
    }
}
