/// Proof verification.
///
/// Four independent checks, each worth 25 points of confidence:
/// - file hash: recomputed from the original bytes when supplied
/// - signature: recomputed over the tuple carried by the proof
/// - timestamp: not in the future and younger than the retention window
/// - Merkle path: checked against a batch root when the caller has one,
///   otherwise only its structure is checked
///
/// A proof is valid at 75 or more. Verification never fails; every problem
/// is reflected in the checks.
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;

use crate::crypto::sign::ProofSigner;
use crate::fingerprint::fingerprint_file;
use crate::merkle::proof::{decode_path, verify_encoded};
use crate::proof::{VerificationChecks, VerificationProof, VerificationResult};

/// How long a proof's timestamp is accepted.
pub const RETENTION_DAYS: i64 = 365;

/// Independently known batch commitment for a proof.
#[derive(Debug, Clone)]
pub struct MerkleContext {
    /// The work's verification hash.
    pub leaf: String,
    /// The batch Merkle root.
    pub root: String,
}

pub struct Verifier {
    signer: Arc<dyn ProofSigner>,
    retention: Duration,
}

impl Verifier {
    pub fn new(signer: Arc<dyn ProofSigner>) -> Self {
        Self {
            signer,
            retention: Duration::days(RETENTION_DAYS),
        }
    }

    /// Verify at the current time.
    pub fn verify(&self, proof: &VerificationProof, bytes: Option<&[u8]>) -> VerificationResult {
        self.verify_at(proof, bytes, Utc::now().timestamp_millis())
    }

    /// Verify as of `now_ms` (Unix milliseconds).
    pub fn verify_at(
        &self,
        proof: &VerificationProof,
        bytes: Option<&[u8]>,
        now_ms: i64,
    ) -> VerificationResult {
        self.evaluate(proof, bytes, None, now_ms)
    }

    /// Verify with a known batch root, making the Merkle check cryptographic.
    pub fn verify_with_root(
        &self,
        proof: &VerificationProof,
        bytes: Option<&[u8]>,
        context: &MerkleContext,
    ) -> VerificationResult {
        self.verify_with_root_at(proof, bytes, context, Utc::now().timestamp_millis())
    }

    pub fn verify_with_root_at(
        &self,
        proof: &VerificationProof,
        bytes: Option<&[u8]>,
        context: &MerkleContext,
        now_ms: i64,
    ) -> VerificationResult {
        self.evaluate(proof, bytes, Some(context), now_ms)
    }

    fn evaluate(
        &self,
        proof: &VerificationProof,
        bytes: Option<&[u8]>,
        context: Option<&MerkleContext>,
        now_ms: i64,
    ) -> VerificationResult {
        let checks = VerificationChecks {
            file_hash_match: bytes.map_or(true, |b| fingerprint_file(b) == proof.file_hash),
            signature_valid: self
                .signer
                .verify(&proof.signature_payload(), &proof.digital_signature),
            timestamp_valid: self.timestamp_valid(proof.timestamp, now_ms),
            merkle_proof_valid: merkle_valid(proof, context),
        };

        let result = VerificationResult::from(checks);
        debug!(
            certificate_id = %proof.certificate_id,
            confidence = result.confidence,
            valid = result.is_valid,
            "Proof verified"
        );
        result
    }

    fn timestamp_valid(&self, timestamp_ms: i64, now_ms: i64) -> bool {
        let age_ms = now_ms.saturating_sub(timestamp_ms);
        age_ms >= 0 && age_ms < self.retention.num_milliseconds()
    }
}

fn merkle_valid(proof: &VerificationProof, context: Option<&MerkleContext>) -> bool {
    match context {
        Some(ctx) => verify_encoded(&ctx.leaf, &proof.merkle_proof, &ctx.root),
        // No independent root: only the shape of the path can be checked
        None => decode_path(&proof.merkle_proof).is_some(),
    }
}
