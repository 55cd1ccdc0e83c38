/// Proof signatures.
///
/// The default scheme is a BLAKE3 keyed hash (HMAC-equivalent) under a single
/// platform secret. Anyone holding that secret can produce a valid signature
/// for any creator, so the secret is the trust boundary of the whole service.
///
/// `Ed25519ProofSigner` is available for deployments that need signatures a
/// third party can check without being able to forge them. It is opt-in.
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::crypto::hash;
use crate::crypto::sensitive::{SecretString, SensitiveBytes32};
use crate::error::{ProofError, Result};

/// BLAKE3 derive_key context for the keyed-hash signing key.
const SIGNING_CONTEXT: &str = "authorship-proof 2024 proof signature v1";

/// The canonical tuple a proof signature covers.
///
/// Field order is fixed by declaration order, so the JSON encoding is
/// canonical. Every field is carried by the published proof, which lets a
/// verifier rebuild the payload without any other input. Block number, block
/// hash and the anchored commitment are bound through `timestamp_hash`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload<'a> {
    pub file_hash: &'a str,
    pub timestamp: i64,
    pub creator: &'a str,
    pub certificate_id: &'a str,
    pub merkle_proof: &'a [String],
    pub timestamp_hash: &'a str,
    pub ipfs_hash: &'a str,
}

impl SignaturePayload<'_> {
    /// Canonical JSON bytes of the payload.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProofError::Serialization(e.to_string()))
    }
}

/// Trait for pluggable proof signature schemes.
pub trait ProofSigner: Send + Sync {
    /// Scheme identifier (e.g., "blake3-keyed", "ed25519").
    fn scheme(&self) -> &str;

    /// Sign the payload. Returns the signature as lowercase hex.
    fn sign(&self, payload: &SignaturePayload<'_>) -> Result<String>;

    /// Check a hex signature. A mismatch or an undecodable signature is
    /// `false`, never an error.
    fn verify(&self, payload: &SignaturePayload<'_>, signature: &str) -> bool;
}

/// Keyed-hash signer over a shared secret.
pub struct KeyedHashSigner {
    key: SensitiveBytes32,
}

impl KeyedHashSigner {
    /// Derive the signing key from the environment-supplied secret.
    pub fn new(secret: &SecretString) -> Result<Self> {
        if secret.is_empty() {
            return Err(ProofError::Signing("signing secret is empty".into()));
        }
        let key = hash::derive_key(SIGNING_CONTEXT, secret.expose().as_bytes());
        Ok(Self {
            key: SensitiveBytes32::new(key),
        })
    }

    fn mac(&self, payload: &SignaturePayload<'_>) -> Result<[u8; 32]> {
        let bytes = payload.canonical_bytes()?;
        Ok(hash::keyed_hash(self.key.as_bytes(), &bytes))
    }
}

impl ProofSigner for KeyedHashSigner {
    fn scheme(&self) -> &str {
        "blake3-keyed"
    }

    fn sign(&self, payload: &SignaturePayload<'_>) -> Result<String> {
        Ok(hex::encode(self.mac(payload)?))
    }

    fn verify(&self, payload: &SignaturePayload<'_>, signature: &str) -> bool {
        let Some(provided) = hash::parse_digest(signature) else {
            return false;
        };
        let Ok(expected) = self.mac(payload) else {
            return false;
        };
        bool::from(expected.ct_eq(&provided))
    }
}

/// Ed25519 signer. Holds only a verifying key when built with
/// [`Ed25519ProofSigner::verifying_only`].
pub struct Ed25519ProofSigner {
    signing_key: Option<SigningKey>,
    verifying_key: VerifyingKey,
}

impl Ed25519ProofSigner {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key: Some(signing_key),
            verifying_key,
        }
    }

    /// Build from a hex-encoded 32-byte secret key.
    pub fn from_secret_hex(secret: &SecretString) -> Result<Self> {
        let bytes = hex::decode(secret.expose().trim())
            .map_err(|e| ProofError::Signing(format!("Invalid Ed25519 key hex: {e}")))?;
        let seed = SensitiveBytes32::from_slice(&bytes)
            .ok_or_else(|| ProofError::Signing("Ed25519 key must be 32 bytes".into()))?;
        let signing_key = SigningKey::from_bytes(seed.as_bytes());
        let verifying_key = signing_key.verifying_key();
        Ok(Self {
            signing_key: Some(signing_key),
            verifying_key,
        })
    }

    pub fn verifying_only(verifying_key: VerifyingKey) -> Self {
        Self {
            signing_key: None,
            verifying_key,
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.verifying_key
    }
}

impl ProofSigner for Ed25519ProofSigner {
    fn scheme(&self) -> &str {
        "ed25519"
    }

    fn sign(&self, payload: &SignaturePayload<'_>) -> Result<String> {
        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| ProofError::Signing("no Ed25519 signing key loaded".into()))?;
        let sig = signing_key.sign(&payload.canonical_bytes()?);
        Ok(hex::encode(sig.to_bytes()))
    }

    fn verify(&self, payload: &SignaturePayload<'_>, signature: &str) -> bool {
        let Ok(bytes) = hex::decode(signature) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        let Ok(message) = payload.canonical_bytes() else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        self.verifying_key.verify(&message, &sig).is_ok()
    }
}
