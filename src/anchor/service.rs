/// Anchor state machine.
///
/// ```text
/// REQUEST ──┬─ signer + balance > 0 ──▶ SUBMIT ──┬──▶ CONFIRMED        (transaction)
///           │                                    └──▶ FAILED ──┐
///           └─ no signer / zero balance ──────────────────────┴──▶ BLOCK_REFERENCE
/// ```
///
/// The transaction path returns `Result<TransactionReceipt, AnchorError>`. Any
/// `AnchorError` other than cancellation falls through to a read of the head
/// block. Anchoring only fails when that read fails too.
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{AnchorRecord, BlockHeader, LedgerClient, LedgerClientRegistry, TransactionReceipt};
use crate::crypto::hash;
use crate::error::{ProofError, Result};

/// Why the transaction path did not produce an anchor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    #[error("no signing key configured")]
    NoSigner,

    #[error("signer {0} has zero balance")]
    Unfunded(String),

    #[error("commitment is not a 32-byte hex digest")]
    InvalidCommitment,

    #[error("{stage} failed: {reason}")]
    Rpc { stage: &'static str, reason: String },

    #[error("{stage} timed out")]
    Timeout { stage: &'static str },

    #[error("transaction {tx_hash} not confirmed: {reason}")]
    Unconfirmed { tx_hash: String, reason: String },

    /// Cancelled by the caller. `submitted` is true once submission started.
    #[error("cancelled")]
    Cancelled {
        submitted: bool,
        tx_hash: Option<String>,
    },
}

impl AnchorError {
    /// Expected degraded paths, logged at info instead of warn.
    fn is_expected(&self) -> bool {
        matches!(self, AnchorError::NoSigner | AnchorError::Unfunded(_))
    }
}

/// Timeouts applied to every ledger call.
#[derive(Debug, Clone)]
pub struct AnchorSettings {
    /// Bound on each RPC (head read, balance, submission).
    pub request_timeout: Duration,
    /// Bound on waiting for a submitted transaction to confirm.
    pub confirmation_timeout: Duration,
}

impl Default for AnchorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            confirmation_timeout: Duration::from_secs(120),
        }
    }
}

/// Head block of one network, or why it could not be read.
#[derive(Debug)]
pub struct NetworkHead {
    pub network_id: String,
    pub head: Result<BlockHeader>,
}

/// Anchors commitments to the networks in its registry.
#[derive(Debug, Clone)]
pub struct AnchorService {
    registry: LedgerClientRegistry,
    settings: AnchorSettings,
}

impl AnchorService {
    pub fn new(registry: LedgerClientRegistry, settings: AnchorSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &LedgerClientRegistry {
        &self.registry
    }

    /// Anchor `commitment_hash` (hex digest) to `network_id`.
    pub async fn anchor(&self, commitment_hash: &str, network_id: &str) -> Result<AnchorRecord> {
        self.anchor_cancellable(commitment_hash, network_id, &CancellationToken::new())
            .await
    }

    /// Like [`anchor`](Self::anchor), stopping when `cancel` fires.
    ///
    /// Cancellation never triggers a resubmission or a fallback. If a
    /// transaction may already have been submitted the caller gets
    /// `AnchorInFlight` and decides what to do next.
    pub async fn anchor_cancellable(
        &self,
        commitment_hash: &str,
        network_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AnchorRecord> {
        let client = self.registry.get(network_id)?;

        info!(network = %network_id, chain = client.chain_name(), "Anchoring commitment");

        let attempt = self
            .try_transaction(client.as_ref(), commitment_hash, cancel)
            .await;

        match attempt {
            Ok(receipt) => {
                let record = AnchorRecord::transaction(network_id, receipt);
                info!(
                    network = %network_id,
                    block = record.block_number,
                    tx_hash = record.transaction_hash.as_deref().unwrap_or_default(),
                    "Transaction anchor confirmed"
                );
                Ok(record)
            }
            Err(AnchorError::Cancelled { submitted: true, tx_hash }) => {
                warn!(network = %network_id, tx_hash = ?tx_hash, "Anchor cancelled after submission");
                Err(ProofError::AnchorInFlight {
                    network: network_id.to_string(),
                    tx_hash,
                })
            }
            Err(AnchorError::Cancelled { submitted: false, .. }) => {
                Err(ProofError::AnchorCancelled(network_id.to_string()))
            }
            Err(reason) => {
                if reason.is_expected() {
                    info!(network = %network_id, reason = %reason, "Using block-reference anchor");
                } else {
                    warn!(
                        network = %network_id,
                        error = %reason,
                        "Transaction anchor failed, falling back to block reference"
                    );
                }
                self.block_reference(client.as_ref(), network_id).await
            }
        }
    }

    /// Anchor to the current head block without a transaction.
    pub async fn block_reference(
        &self,
        client: &dyn LedgerClient,
        network_id: &str,
    ) -> Result<AnchorRecord> {
        let unavailable = |reason: String| ProofError::AnchorUnavailable {
            network: network_id.to_string(),
            reason,
        };

        let head = tokio::time::timeout(self.settings.request_timeout, client.get_latest_block())
            .await
            .map_err(|_| unavailable("head block read timed out".into()))?
            .map_err(|e| unavailable(e.to_string()))?;

        info!(network = %network_id, block = head.number, "Block-reference anchor");
        Ok(AnchorRecord::block_reference(network_id, head))
    }

    /// Read the head of every registered network concurrently.
    pub async fn latest_blocks(&self) -> Vec<NetworkHead> {
        let reads = self.registry.iter().map(|(network_id, client)| async move {
            let head = match tokio::time::timeout(
                self.settings.request_timeout,
                client.get_latest_block(),
            )
            .await
            {
                Ok(head) => head,
                Err(_) => Err(ProofError::AnchorUnavailable {
                    network: network_id.clone(),
                    reason: "head block read timed out".into(),
                }),
            };
            NetworkHead {
                network_id: network_id.clone(),
                head,
            }
        });
        join_all(reads).await
    }

    async fn try_transaction(
        &self,
        client: &dyn LedgerClient,
        commitment_hash: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<TransactionReceipt, AnchorError> {
        let address = client.signer_address().ok_or(AnchorError::NoSigner)?;
        let payload = hash::parse_digest(commitment_hash).ok_or(AnchorError::InvalidCommitment)?;

        let balance = self
            .bounded(cancel, false, "balance query", client.get_balance(&address))
            .await?;
        if balance == 0 {
            return Err(AnchorError::Unfunded(address));
        }

        let pending = self
            .bounded(cancel, true, "submission", client.send_self_transaction(&payload))
            .await?;

        info!(tx_hash = %pending.tx_hash, "Anchor transaction submitted");

        let timeout = self.settings.confirmation_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AnchorError::Cancelled {
                submitted: true,
                tx_hash: Some(pending.tx_hash.clone()),
            }),
            res = tokio::time::timeout(timeout, client.wait_for_receipt(&pending, timeout)) => match res {
                Ok(Ok(receipt)) => Ok(receipt),
                Ok(Err(e)) => Err(AnchorError::Unconfirmed {
                    tx_hash: pending.tx_hash.clone(),
                    reason: e.to_string(),
                }),
                Err(_) => Err(AnchorError::Unconfirmed {
                    tx_hash: pending.tx_hash.clone(),
                    reason: "confirmation timed out".into(),
                }),
            },
        }
    }

    /// Run one ledger call under the request timeout and the cancel token.
    async fn bounded<T>(
        &self,
        cancel: &CancellationToken,
        submitting: bool,
        stage: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, AnchorError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AnchorError::Cancelled {
                submitted: submitting,
                tx_hash: None,
            }),
            res = tokio::time::timeout(self.settings.request_timeout, call) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(AnchorError::Rpc {
                    stage,
                    reason: e.to_string(),
                }),
                Err(_) => Err(AnchorError::Timeout { stage }),
            },
        }
    }
}
