/// Published proof format and verification results.
///
/// `VerificationProof` is the durable artifact handed to the caller. It is
/// created once at issuance, never mutated, and verifiable on its own given
/// the signing key (and optionally the original bytes).
use serde::{Deserialize, Serialize};

use crate::crypto::sign::SignaturePayload;
use crate::error::{ProofError, Result};

/// Wire format. All fields are required; unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerificationProof {
    /// Hex SHA-256 of the original bytes.
    pub file_hash: String,
    /// Issuance time, Unix milliseconds.
    pub timestamp: i64,
    pub creator: String,
    /// Side-tagged sibling path (`"L:<hex>"` / `"R:<hex>"`), empty for a
    /// single-work batch.
    pub merkle_proof: Vec<String>,
    /// Anchor timestamp hash.
    pub blockchain_anchor: String,
    /// Content identifier, empty if content storage was unavailable.
    pub ipfs_hash: String,
    pub digital_signature: String,
    pub certificate_id: String,
}

impl VerificationProof {
    /// Parse a proof received at a transport boundary.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ProofError::MalformedProof(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ProofError::Serialization(e.to_string()))
    }

    /// The tuple covered by `digital_signature`.
    pub fn signature_payload(&self) -> SignaturePayload<'_> {
        SignaturePayload {
            file_hash: &self.file_hash,
            timestamp: self.timestamp,
            creator: &self.creator,
            certificate_id: &self.certificate_id,
            merkle_proof: &self.merkle_proof,
            timestamp_hash: &self.blockchain_anchor,
            ipfs_hash: &self.ipfs_hash,
        }
    }

    /// Whether content storage was skipped or failed at issuance.
    pub fn content_unavailable(&self) -> bool {
        self.ipfs_hash.is_empty()
    }
}

/// Outcome of each independent check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationChecks {
    pub file_hash_match: bool,
    pub signature_valid: bool,
    pub timestamp_valid: bool,
    pub merkle_proof_valid: bool,
}

impl VerificationChecks {
    pub fn passed(&self) -> u8 {
        [
            self.file_hash_match,
            self.signature_valid,
            self.timestamp_valid,
            self.merkle_proof_valid,
        ]
        .iter()
        .filter(|c| **c)
        .count() as u8
    }
}

/// Minimum confidence for a proof to count as valid.
pub const VALIDITY_THRESHOLD: u8 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_valid: bool,
    pub checks: VerificationChecks,
    /// Percentage of checks passed, 0–100.
    pub confidence: u8,
}

impl From<VerificationChecks> for VerificationResult {
    fn from(checks: VerificationChecks) -> Self {
        let confidence = checks.passed() * 25;
        Self {
            is_valid: confidence >= VALIDITY_THRESHOLD,
            checks,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VerificationProof {
        VerificationProof {
            file_hash: "aa".into(),
            timestamp: 1_700_000_000_000,
            creator: "alice".into(),
            merkle_proof: vec![],
            blockchain_anchor: "bb".into(),
            ipfs_hash: "bafy".into(),
            digital_signature: "cc".into(),
            certificate_id: "C1".into(),
        }
    }

    fn checks(n: usize) -> VerificationChecks {
        VerificationChecks {
            file_hash_match: n > 0,
            signature_valid: n > 1,
            timestamp_valid: n > 2,
            merkle_proof_valid: n > 3,
        }
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "blockchainAnchor",
                "certificateId",
                "creator",
                "digitalSignature",
                "fileHash",
                "ipfsHash",
                "merkleProof",
                "timestamp",
            ]
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let json = sample().to_json().unwrap();
        assert_eq!(VerificationProof::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("digitalSignature");
        let err = VerificationProof::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ProofError::MalformedProof(_)));
    }

    #[test]
    fn test_unknown_field_is_malformed() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["blockNumber"] = serde_json::json!(1);
        assert!(matches!(
            VerificationProof::from_json(&value.to_string()),
            Err(ProofError::MalformedProof(_))
        ));
    }

    #[test]
    fn test_non_integer_timestamp_is_malformed() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["timestamp"] = serde_json::json!("yesterday");
        assert!(VerificationProof::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn test_confidence_strictly_decreases() {
        let scores: Vec<u8> = (0..=4).rev().map(|n| VerificationResult::from(checks(n)).confidence).collect();
        assert_eq!(scores, vec![100, 75, 50, 25, 0]);
        assert!(scores.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_validity_threshold() {
        assert!(VerificationResult::from(checks(4)).is_valid);
        assert!(VerificationResult::from(checks(3)).is_valid);
        assert!(!VerificationResult::from(checks(2)).is_valid);
    }

    #[test]
    fn test_result_wire_format() {
        let value = serde_json::to_value(VerificationResult::from(checks(4))).unwrap();
        assert_eq!(value["isValid"], true);
        assert_eq!(value["confidence"], 100);
        assert_eq!(value["checks"]["merkleProofValid"], true);
    }
}
