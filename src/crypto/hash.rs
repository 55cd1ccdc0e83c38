/// Hashing utilities.
///
/// - SHA-256 for fingerprints, Merkle nodes and anchor timestamp hashes
///   (the digests that end up in a published proof)
/// - BLAKE3 keyed hashing and key derivation for proof signatures
use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Lowercase hex SHA-256 of arbitrary data.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Parse a 64-character hex string into a 32-byte digest.
pub fn parse_digest(hex_str: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

/// Keyed hash for domain-separated operations.
/// The key must be exactly 32 bytes.
pub fn keyed_hash(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    blake3::keyed_hash(key, data).into()
}

/// Derive a key from input keying material using BLAKE3's key derivation mode.
/// Context should be a unique, hardcoded string identifying the usage.
pub fn derive_key(context: &str, ikm: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    let mut deriver = blake3::Hasher::new_derive_key(context);
    deriver.update(ikm);
    let mut reader = deriver.finalize_xof();
    reader.fill(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha256_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_parse_digest() {
        let h = sha256(b"abc");
        assert_eq!(parse_digest(&hex::encode(h)), Some(h));
        assert_eq!(parse_digest("abcd"), None);
        assert_eq!(parse_digest("zz"), None);
    }

    #[test]
    fn test_keyed_hash() {
        let key = [0x42u8; 32];
        let h1 = keyed_hash(&key, b"data");
        let h2 = keyed_hash(&key, b"data");
        assert_eq!(h1, h2);

        let key2 = [0x43u8; 32];
        let h3 = keyed_hash(&key2, b"data");
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_derive_key() {
        let k1 = derive_key("authorship-proof test context", b"input");
        let k2 = derive_key("authorship-proof test context", b"input");
        assert_eq!(k1, k2);

        let k3 = derive_key("different context", b"input");
        assert_ne!(k1, k3);
    }
}
