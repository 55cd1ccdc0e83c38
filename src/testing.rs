//! In-memory doubles for ledger and content-store collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::anchor::{BlockHeader, LedgerClient, PendingTransaction, TransactionReceipt};
use crate::error::{ProofError, Result};
use crate::storage::ContentStore;

pub const HEAD_NUMBER: u64 = 19_000_000;
pub const HEAD_TIMESTAMP: i64 = 1_700_000_000;

pub fn head() -> BlockHeader {
    BlockHeader {
        number: HEAD_NUMBER,
        hash: format!("0x{}", "ab".repeat(32)),
        timestamp: HEAD_TIMESTAMP,
    }
}

pub struct MockLedger {
    pub head: Option<BlockHeader>,
    pub signer: Option<String>,
    pub balance: u128,
    pub fail_send: bool,
    pub fail_receipt: bool,
    pub send_delay: Option<Duration>,
    pub receipt_delay: Option<Duration>,
    pub sends: AtomicUsize,
    pub head_reads: AtomicUsize,
    pub payloads: Mutex<Vec<Vec<u8>>>,
}

impl MockLedger {
    /// Reachable chain, no signer configured.
    pub fn unfunded() -> Self {
        Self {
            head: Some(head()),
            signer: None,
            balance: 0,
            fail_send: false,
            fail_receipt: false,
            send_delay: None,
            receipt_delay: None,
            sends: AtomicUsize::new(0),
            head_reads: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Reachable chain with a funded signer.
    pub fn funded() -> Self {
        Self {
            signer: Some("0xsigner".into()),
            balance: 1_000_000,
            ..Self::unfunded()
        }
    }

    /// Nothing answers.
    pub fn offline() -> Self {
        Self {
            head: None,
            ..Self::unfunded()
        }
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn head_read_count(&self) -> usize {
        self.head_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn chain_name(&self) -> &str {
        "mock"
    }

    fn signer_address(&self) -> Option<String> {
        self.signer.clone()
    }

    async fn get_latest_block(&self) -> Result<BlockHeader> {
        self.head_reads.fetch_add(1, Ordering::SeqCst);
        self.head
            .clone()
            .ok_or_else(|| ProofError::Ledger("connection refused".into()))
    }

    async fn get_balance(&self, _address: &str) -> Result<u128> {
        if self.head.is_none() {
            return Err(ProofError::Ledger("connection refused".into()));
        }
        Ok(self.balance)
    }

    async fn send_self_transaction(&self, payload: &[u8]) -> Result<PendingTransaction> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_send {
            return Err(ProofError::Ledger("insufficient funds for gas".into()));
        }
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload.to_vec());
        }
        Ok(PendingTransaction {
            tx_hash: format!("0x{}", "cd".repeat(32)),
        })
    }

    async fn wait_for_receipt(
        &self,
        pending: &PendingTransaction,
        _timeout: Duration,
    ) -> Result<TransactionReceipt> {
        if let Some(delay) = self.receipt_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_receipt {
            return Err(ProofError::Ledger("transaction reverted".into()));
        }
        let mut block = head();
        block.number += 1;
        block.timestamp += 12;
        Ok(TransactionReceipt {
            tx_hash: pending.tx_hash.clone(),
            block,
            gas_used: Some(21_512),
        })
    }
}

pub struct MockContentStore {
    pub cid: Option<String>,
    pub calls: AtomicUsize,
}

impl MockContentStore {
    pub fn online() -> Self {
        Self {
            cid: Some("bafkreimockcid".into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        Self {
            cid: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn store(&self, _data: &[u8]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cid
            .clone()
            .ok_or_else(|| ProofError::ContentStore("IPFS node unreachable".into()))
    }
}
