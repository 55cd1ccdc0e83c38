/// Fingerprinting of works.
///
/// ```text
/// fileHash         = SHA-256(bytes)
/// metadataHash     = SHA-256(canonical-JSON(metadata, timestamp))
/// verificationHash = SHA-256(fileHash_hex || metadataHash_hex)
/// ```
///
/// Collaborators are sorted before serialization so the order in which they
/// were entered never changes the verification hash.
use serde::{Deserialize, Serialize};

use crate::crypto::hash;

/// Descriptive metadata of a work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkMetadata {
    pub title: String,
    pub creator: String,
    #[serde(default)]
    pub collaborators: Vec<String>,
    pub certificate_id: String,
}

/// Canonical form of the metadata. Field order here is the key order of the
/// serialized JSON.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalMetadata<'a> {
    title: &'a str,
    creator: &'a str,
    collaborators: Vec<&'a str>,
    certificate_id: &'a str,
    timestamp: i64,
}

/// Hex SHA-256 of the raw file bytes.
pub fn fingerprint_file(bytes: &[u8]) -> String {
    hash::sha256_hex(bytes)
}

/// Canonical JSON of the metadata plus the issuance timestamp.
pub fn canonical_metadata(metadata: &WorkMetadata, timestamp_ms: i64) -> String {
    let mut collaborators: Vec<&str> = metadata.collaborators.iter().map(String::as_str).collect();
    collaborators.sort_unstable();

    let canonical = CanonicalMetadata {
        title: &metadata.title,
        creator: &metadata.creator,
        collaborators,
        certificate_id: &metadata.certificate_id,
        timestamp: timestamp_ms,
    };

    // A struct of strings, a string list and an integer always serializes.
    serde_json::to_string(&canonical).unwrap_or_default()
}

/// Verification hash binding the file fingerprint to its metadata and time.
pub fn fingerprint_work(bytes: &[u8], metadata: &WorkMetadata, timestamp_ms: i64) -> String {
    let file_hash = fingerprint_file(bytes);
    let metadata_hash = hash::sha256_hex(canonical_metadata(metadata, timestamp_ms).as_bytes());

    let mut combined = String::with_capacity(file_hash.len() + metadata_hash.len());
    combined.push_str(&file_hash);
    combined.push_str(&metadata_hash);
    hash::sha256_hex(combined.as_bytes())
}
