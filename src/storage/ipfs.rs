/// IPFS content store via the Kubo HTTP API (typically localhost:5001).
///
/// Content is added with CIDv1 and pinned. IPFS itself does not guarantee
/// persistence; the CID is used here only as a reference in the proof.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::ContentStore;
use crate::error::{ProofError, Result};

/// Configuration for IPFS HTTP API.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// IPFS API endpoint (e.g., "http://localhost:5001").
    pub api_url: String,
    /// Bound on one add request.
    pub timeout: Duration,
}

pub struct IpfsStore {
    client: Client,
    config: IpfsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IpfsAddResponse {
    hash: String,
}

impl IpfsStore {
    pub fn new(config: IpfsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProofError::Config(format!("IPFS client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ContentStore for IpfsStore {
    fn name(&self) -> &str {
        "IPFS"
    }

    async fn store(&self, data: &[u8]) -> Result<String> {
        let part = multipart::Part::bytes(data.to_vec()).file_name("data");
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(format!("{}/api/v0/add", self.config.api_url))
            .query(&[("pin", "true"), ("cid-version", "1")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProofError::ContentStore(format!("IPFS add request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProofError::ContentStore(format!("IPFS add failed: {body}")));
        }

        let add_resp: IpfsAddResponse = resp
            .json()
            .await
            .map_err(|e| ProofError::Serialization(format!("IPFS response parse error: {e}")))?;

        debug!(cid = %add_resp.hash, size = data.len(), "Stored content on IPFS");
        Ok(add_resp.hash)
    }
}
