/// Proof issuance pipeline.
///
/// Coordinates the full issuance flow for one work (or a batch):
/// 1. Fingerprint the file bytes
/// 2. Derive the verification hash (file + canonical metadata + time)
/// 3. Build the Merkle commitment over the batch
/// 4. Anchor the commitment root to the selected ledger network
/// 5. Store the bytes with the content-addressing collaborator
/// 6. Sign the proof tuple
///
/// Nothing is persisted here. The caller owns the returned proof.
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::anchor::{self, AnchorRecord, AnchorService};
use crate::crypto::sign::ProofSigner;
use crate::error::{ProofError, Result};
use crate::fingerprint::{fingerprint_file, fingerprint_work, WorkMetadata};
use crate::merkle::MerkleTree;
use crate::proof::VerificationProof;
use crate::storage::ContentStore;
use crate::verify::Verifier;

/// Requested assurance tier. Informational: logged and kept in the audit
/// record, not part of the signed proof.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    Basic,
    #[default]
    Standard,
    Premium,
}

impl std::str::FromStr for VerificationLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unknown verification level: {other}")),
        }
    }
}

/// Options for one issuance.
#[derive(Debug, Clone)]
pub struct IssueOptions {
    pub network_id: String,
    pub verification_level: VerificationLevel,
}

/// One work in a batch.
#[derive(Debug, Clone, Copy)]
pub struct WorkInput<'a> {
    pub bytes: &'a [u8],
    pub metadata: &'a WorkMetadata,
}

/// A proof together with its audit trail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedProof {
    pub proof: VerificationProof,
    pub verification_hash: String,
    pub merkle_root: String,
    pub anchor: AnchorRecord,
    pub verification_level: VerificationLevel,
}

/// Issues proofs. Stateless between calls; share it behind an `Arc`.
pub struct ProofEngine {
    anchors: AnchorService,
    signer: Arc<dyn ProofSigner>,
    content_store: Option<Arc<dyn ContentStore>>,
}

impl ProofEngine {
    pub fn new(
        anchors: AnchorService,
        signer: Arc<dyn ProofSigner>,
        content_store: Option<Arc<dyn ContentStore>>,
    ) -> Self {
        Self {
            anchors,
            signer,
            content_store,
        }
    }

    pub fn anchors(&self) -> &AnchorService {
        &self.anchors
    }

    /// Verifier sharing this engine's signing key.
    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.signer.clone())
    }

    /// Issue a proof for one work at the current time.
    pub async fn issue_proof(
        &self,
        bytes: &[u8],
        metadata: &WorkMetadata,
        options: &IssueOptions,
    ) -> Result<VerificationProof> {
        let issued = self.issue_proof_with_audit(bytes, metadata, options).await?;
        Ok(issued.proof)
    }

    /// Issue a proof and keep the anchor record for audit.
    pub async fn issue_proof_with_audit(
        &self,
        bytes: &[u8],
        metadata: &WorkMetadata,
        options: &IssueOptions,
    ) -> Result<IssuedProof> {
        self.issue_proof_at(bytes, metadata, options, Utc::now().timestamp_millis())
            .await
    }

    /// Issue a proof with an explicit issuance timestamp (Unix ms).
    pub async fn issue_proof_at(
        &self,
        bytes: &[u8],
        metadata: &WorkMetadata,
        options: &IssueOptions,
        timestamp_ms: i64,
    ) -> Result<IssuedProof> {
        let work = WorkInput { bytes, metadata };
        self.issue_batch_cancellable(&[work], options, timestamp_ms, &CancellationToken::new())
            .await?
            .into_iter()
            .next()
            .ok_or(ProofError::EmptyInput)
    }

    /// Issue proofs for several works under one Merkle root and one anchor.
    pub async fn issue_batch(
        &self,
        works: &[WorkInput<'_>],
        options: &IssueOptions,
    ) -> Result<Vec<IssuedProof>> {
        self.issue_batch_cancellable(
            works,
            options,
            Utc::now().timestamp_millis(),
            &CancellationToken::new(),
        )
        .await
    }

    /// Batch issuance with an explicit timestamp and cancellation.
    ///
    /// Fails with `EmptyInput` for an empty batch.
    pub async fn issue_batch_cancellable(
        &self,
        works: &[WorkInput<'_>],
        options: &IssueOptions,
        timestamp_ms: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<IssuedProof>> {
        info!(
            works = works.len(),
            network = %options.network_id,
            level = ?options.verification_level,
            "Issuing proofs"
        );

        // 1-2. Fingerprints
        let file_hashes: Vec<String> = works.iter().map(|w| fingerprint_file(w.bytes)).collect();
        let verification_hashes: Vec<String> = works
            .iter()
            .map(|w| fingerprint_work(w.bytes, w.metadata, timestamp_ms))
            .collect();

        // 3. Merkle commitment
        let tree = MerkleTree::from_hex_leaves(&verification_hashes)?;
        let root = tree.root_hex();

        // 4. Anchor the root (equal to the verification hash for one work)
        let record = self
            .anchors
            .anchor_cancellable(&root, &options.network_id, cancel)
            .await?;
        let timestamp_hash = anchor::timestamp_hash(&root, &record);

        // 5. Content identifiers
        let content_ids = join_all(works.iter().map(|w| self.store_content(w.bytes))).await;

        // 6. Sign each proof
        let mut issued = Vec::with_capacity(works.len());
        for (index, ((work, file_hash), (verification_hash, ipfs_hash))) in works
            .iter()
            .zip(file_hashes)
            .zip(verification_hashes.into_iter().zip(content_ids))
            .enumerate()
        {
            let merkle_proof = tree.prove(index).map(|p| p.encode()).unwrap_or_default();

            let mut proof = VerificationProof {
                file_hash,
                timestamp: timestamp_ms,
                creator: work.metadata.creator.clone(),
                merkle_proof,
                blockchain_anchor: timestamp_hash.clone(),
                ipfs_hash,
                digital_signature: String::new(),
                certificate_id: work.metadata.certificate_id.clone(),
            };
            proof.digital_signature = self.signer.sign(&proof.signature_payload())?;

            issued.push(IssuedProof {
                proof,
                verification_hash,
                merkle_root: root.clone(),
                anchor: record.clone(),
                verification_level: options.verification_level,
            });
        }

        info!(
            proofs = issued.len(),
            network = %record.network_id,
            kind = ?record.kind,
            block = record.block_number,
            "Proofs issued"
        );

        Ok(issued)
    }

    /// Content identifier for `bytes`, or an empty string if storage is
    /// unavailable.
    async fn store_content(&self, bytes: &[u8]) -> String {
        let Some(store) = &self.content_store else {
            return String::new();
        };
        match store.store(bytes).await {
            Ok(cid) => cid,
            Err(e) => {
                warn!(
                    backend = store.name(),
                    error = %e,
                    "Content storage failed, issuing proof without content identifier"
                );
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::anchor::{AnchorKind, AnchorSettings, LedgerClientRegistry};
    use crate::crypto::sensitive::SecretString;
    use crate::crypto::sign::KeyedHashSigner;
    use crate::merkle::verify_encoded;
    use crate::testing::{MockContentStore, MockLedger};
    use crate::verify::MerkleContext;

    const NOW: i64 = 1_760_000_000_000;

    fn metadata() -> WorkMetadata {
        WorkMetadata {
            title: "T".into(),
            creator: "alice".into(),
            collaborators: vec![],
            certificate_id: "C1".into(),
        }
    }

    fn options() -> IssueOptions {
        IssueOptions {
            network_id: "sepolia".into(),
            verification_level: VerificationLevel::Standard,
        }
    }

    fn engine(ledger: MockLedger, store: Option<Arc<MockContentStore>>) -> ProofEngine {
        let registry = LedgerClientRegistry::new().with_client("sepolia", Arc::new(ledger));
        let signer = KeyedHashSigner::new(&SecretString::new("test secret")).unwrap();
        ProofEngine::new(
            AnchorService::new(registry, AnchorSettings::default()),
            Arc::new(signer),
            store.map(|s| s as Arc<dyn ContentStore>),
        )
    }

    #[tokio::test]
    async fn test_single_work_proof_fields() {
        let store = Arc::new(MockContentStore::online());
        let engine = engine(MockLedger::unfunded(), Some(store.clone()));

        let issued = engine
            .issue_proof_at(b"hello", &metadata(), &options(), NOW)
            .await
            .unwrap();
        let proof = &issued.proof;

        assert_eq!(
            proof.file_hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(proof.timestamp, NOW);
        assert_eq!(proof.creator, "alice");
        assert_eq!(proof.certificate_id, "C1");
        assert!(proof.merkle_proof.is_empty());
        assert_eq!(proof.ipfs_hash, "bafkreimockcid");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        // Single leaf: the root is the verification hash
        assert_eq!(
            issued.verification_hash,
            fingerprint_work(b"hello", &metadata(), NOW)
        );
        assert_eq!(issued.merkle_root, issued.verification_hash);
        assert_eq!(issued.anchor.kind, AnchorKind::BlockReference);
        assert_eq!(
            proof.blockchain_anchor,
            anchor::timestamp_hash(&issued.verification_hash, &issued.anchor)
        );
    }

    #[tokio::test]
    async fn test_issue_then_verify_hello() {
        let engine = engine(MockLedger::unfunded(), None);
        let proof = engine
            .issue_proof_at(b"hello", &metadata(), &options(), NOW)
            .await
            .unwrap()
            .proof;
        let verifier = engine.verifier();

        let result = verifier.verify_at(&proof, Some(b"hello"), NOW + 1_000);
        assert_eq!(result.confidence, 100);
        assert!(result.is_valid);

        let result = verifier.verify_at(&proof, Some(b"hellO"), NOW + 1_000);
        assert!(!result.checks.file_hash_match);
        assert_eq!(result.confidence, 75);
        assert!(result.is_valid);

        // Survives the wire format
        let parsed = VerificationProof::from_json(&proof.to_json().unwrap()).unwrap();
        assert_eq!(verifier.verify_at(&parsed, None, NOW + 1_000).confidence, 100);
    }

    #[tokio::test]
    async fn test_transaction_anchor_when_funded() {
        let engine = engine(MockLedger::funded(), None);
        let issued = engine
            .issue_proof_at(b"hello", &metadata(), &options(), NOW)
            .await
            .unwrap();
        assert_eq!(issued.anchor.kind, AnchorKind::Transaction);
    }

    #[tokio::test]
    async fn test_content_store_failure_is_explicit() {
        let engine = engine(MockLedger::unfunded(), Some(Arc::new(MockContentStore::offline())));
        let proof = engine
            .issue_proof(b"hello", &metadata(), &options())
            .await
            .unwrap();
        assert!(proof.content_unavailable());
        assert_eq!(proof.ipfs_hash, "");
    }

    #[tokio::test]
    async fn test_anchor_unavailable_propagates() {
        let engine = engine(MockLedger::offline(), None);
        let err = engine
            .issue_proof(b"hello", &metadata(), &options())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProofError::AnchorUnavailable { ref network, .. } if network == "sepolia"
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let engine = engine(MockLedger::unfunded(), None);
        let err = engine.issue_batch(&[], &options()).await.unwrap_err();
        assert!(matches!(err, ProofError::EmptyInput));
    }

    #[tokio::test]
    async fn test_batch_shares_root_and_anchor() {
        let engine = engine(MockLedger::unfunded(), None);
        let md: Vec<WorkMetadata> = (0..3)
            .map(|i| WorkMetadata {
                certificate_id: format!("C{i}"),
                ..metadata()
            })
            .collect();
        let contents: Vec<Vec<u8>> = (0..3u8).map(|i| vec![i; 8]).collect();
        let works: Vec<WorkInput<'_>> = contents
            .iter()
            .zip(&md)
            .map(|(bytes, metadata)| WorkInput { bytes, metadata })
            .collect();

        let issued = engine
            .issue_batch_cancellable(&works, &options(), NOW, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(issued.len(), 3);

        let root = &issued[0].merkle_root;
        let anchor = &issued[0].proof.blockchain_anchor;
        let verifier = engine.verifier();

        for item in &issued {
            assert_eq!(&item.merkle_root, root);
            assert_eq!(&item.proof.blockchain_anchor, anchor);
            assert_eq!(item.proof.merkle_proof.len(), 2);
            assert!(verify_encoded(&item.verification_hash, &item.proof.merkle_proof, root));

            let context = MerkleContext {
                leaf: item.verification_hash.clone(),
                root: root.clone(),
            };
            let result = verifier.verify_with_root_at(&item.proof, None, &context, NOW + 1);
            assert_eq!(result.confidence, 100);
        }
    }

    #[tokio::test]
    async fn test_cancelled_issuance_submits_nothing() {
        let engine = engine(MockLedger::funded(), None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let work = WorkInput {
            bytes: b"hello",
            metadata: &metadata(),
        };
        let err = engine
            .issue_batch_cancellable(&[work], &options(), NOW, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProofError::AnchorCancelled(_)));
    }

    #[test]
    fn test_verification_level_parse() {
        assert_eq!("basic".parse::<VerificationLevel>(), Ok(VerificationLevel::Basic));
        assert!("gold".parse::<VerificationLevel>().is_err());
    }
}
