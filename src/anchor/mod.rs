/// Ledger anchoring for proof timestamps.
///
/// A commitment hash is anchored to one named ledger network. With a funded
/// signer the hash is written into a self-directed transaction; otherwise,
/// or when that fails, the anchor is a passive reference to the chain's
/// current head block.
///
/// Supported chains:
/// - Ethereum: calldata in a legacy transaction to self
/// - Bitcoin: OP_RETURN output
///
/// Each network is an independent client in a [`LedgerClientRegistry`] that
/// callers build and pass in. There is no process-wide provider map.
pub mod bitcoin;
pub mod ethereum;
pub mod service;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::hash;
use crate::error::{ProofError, Result};

pub use service::{AnchorError, AnchorService, AnchorSettings, NetworkHead};

/// Head (or confirmed) block reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: String,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Handle for a submitted, not yet confirmed, transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub tx_hash: String,
}

/// Confirmation of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub block: BlockHeader,
    /// Gas (Ethereum) or fee in sats (Bitcoin), if the chain reports it.
    pub gas_used: Option<u64>,
}

/// How an anchor was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorKind {
    /// A funded signer submitted a transaction and it confirmed.
    Transaction,
    /// Passive commitment to the chain head, no funds spent.
    BlockReference,
}

/// Audit record of one anchor. Never embedded in a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRecord {
    pub network_id: String,
    pub block_number: u64,
    pub block_hash: String,
    pub block_timestamp: i64,
    pub transaction_hash: Option<String>,
    pub gas_used: Option<u64>,
    pub kind: AnchorKind,
}

impl AnchorRecord {
    pub fn block_reference(network_id: &str, block: BlockHeader) -> Self {
        Self {
            network_id: network_id.to_string(),
            block_number: block.number,
            block_hash: block.hash,
            block_timestamp: block.timestamp,
            transaction_hash: None,
            gas_used: None,
            kind: AnchorKind::BlockReference,
        }
    }

    pub fn transaction(network_id: &str, receipt: TransactionReceipt) -> Self {
        Self {
            network_id: network_id.to_string(),
            block_number: receipt.block.number,
            block_hash: receipt.block.hash,
            block_timestamp: receipt.block.timestamp,
            transaction_hash: Some(receipt.tx_hash),
            gas_used: receipt.gas_used,
            kind: AnchorKind::Transaction,
        }
    }
}

/// Digest embedded in a proof as `blockchainAnchor`.
///
/// `SHA-256(commitment_hash || block_number || block_hash || block_timestamp)`
/// over the decimal/hex string forms.
pub fn timestamp_hash(commitment_hash: &str, record: &AnchorRecord) -> String {
    let input = format!(
        "{}{}{}{}",
        commitment_hash, record.block_number, record.block_hash, record.block_timestamp
    );
    hash::sha256_hex(input.as_bytes())
}

/// Client for one ledger network.
///
/// Implementations perform the raw chain calls only. Timeouts, fallback and
/// cancellation are handled by [`AnchorService`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Name of the chain family (e.g., "ethereum", "bitcoin").
    fn chain_name(&self) -> &str;

    /// Address of the configured signing account, if any.
    fn signer_address(&self) -> Option<String>;

    /// Current head block.
    async fn get_latest_block(&self) -> Result<BlockHeader>;

    /// Spendable balance of `address` in the chain's smallest unit.
    async fn get_balance(&self, address: &str) -> Result<u128>;

    /// Submit a minimal transaction to self carrying `payload`.
    async fn send_self_transaction(&self, payload: &[u8]) -> Result<PendingTransaction>;

    /// Wait up to `timeout` for the transaction to confirm.
    async fn wait_for_receipt(
        &self,
        pending: &PendingTransaction,
        timeout: Duration,
    ) -> Result<TransactionReceipt>;
}

/// Ledger clients keyed by network id.
#[derive(Clone, Default)]
pub struct LedgerClientRegistry {
    clients: BTreeMap<String, Arc<dyn LedgerClient>>,
}

impl LedgerClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, network_id: impl Into<String>, client: Arc<dyn LedgerClient>) {
        self.clients.insert(network_id.into(), client);
    }

    pub fn with_client(mut self, network_id: impl Into<String>, client: Arc<dyn LedgerClient>) -> Self {
        self.register(network_id, client);
        self
    }

    pub fn get(&self, network_id: &str) -> Result<Arc<dyn LedgerClient>> {
        self.clients
            .get(network_id)
            .cloned()
            .ok_or_else(|| ProofError::UnknownNetwork(network_id.to_string()))
    }

    pub fn network_ids(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LedgerClient>)> {
        self.clients.iter()
    }
}

impl std::fmt::Debug for LedgerClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClientRegistry")
            .field("networks", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}
