/// Content-addressing collaborator.
///
/// The engine only needs an opaque content identifier for the original
/// bytes. Failure to store never aborts issuance: the proof carries an empty
/// `ipfsHash` instead of a made-up identifier.
pub mod ipfs;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for content-addressed storage backends.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Human-readable name of this backend (e.g., "IPFS").
    fn name(&self) -> &str;

    /// Store `data` and return its content identifier.
    async fn store(&self, data: &[u8]) -> Result<String>;
}
