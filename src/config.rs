/// TOML configuration and environment-backed secrets.
///
/// Loading order: explicit path, `authorship-proof.toml` in the working
/// directory, `~/.config/authorship-proof/config.toml`, built-in defaults.
/// Environment overrides are applied on top. Secrets never live in the file;
/// networks name the env var that holds their key.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::anchor::bitcoin::{BitcoinClient, BitcoinConfig};
use crate::anchor::ethereum::{EthereumClient, EthereumConfig};
use crate::anchor::{AnchorSettings, LedgerClient, LedgerClientRegistry};
use crate::crypto::sensitive::SecretString;
use crate::crypto::sign::{Ed25519ProofSigner, KeyedHashSigner, ProofSigner};
use crate::error::{ProofError, Result};
use crate::storage::ipfs::{IpfsConfig, IpfsStore};
use crate::storage::ContentStore;

/// Env var holding the proof signing secret.
pub const SIGNING_SECRET_ENV: &str = "PROOF_SIGNING_SECRET";

const CONFIG_FILE: &str = "authorship-proof.toml";

// Config structs (one per TOML section)

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub anchor: AnchorConfig,
    pub networks: Vec<NetworkConfig>,
    pub ipfs: IpfsSection,
    pub signing: SigningConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub request_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Ethereum,
    Bitcoin,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub id: String,
    pub kind: NetworkKind,
    pub rpc_url: String,
    /// Required for Ethereum networks.
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Bitcoin network name, defaults to "mainnet".
    #[serde(default)]
    pub network: Option<String>,
    /// Env var holding this network's signing key. Without it the network
    /// only serves block references.
    #[serde(default)]
    pub signer_key_env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpfsSection {
    /// Kubo API URL. Empty disables content storage.
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningScheme {
    #[default]
    KeyedHash,
    /// Secret is a hex-encoded 32-byte Ed25519 key.
    Ed25519,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub scheme: SigningScheme,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        let settings = AnchorSettings::default();
        Self {
            request_timeout_secs: settings.request_timeout.as_secs(),
            confirmation_timeout_secs: settings.confirmation_timeout.as_secs(),
            poll_interval_ms: 2_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

// Loading

impl EngineConfig {
    /// Load from `path`. A missing file yields defaults; a malformed one is
    /// an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let cfg: EngineConfig = toml::from_str(&text)
            .map_err(|e| ProofError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        debug!(path = %path.display(), networks = cfg.networks.len(), "Loaded config");
        Ok(cfg)
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Self::load_from(&local);
        }

        if let Some(home) = std::env::var_os("HOME") {
            let candidate = PathBuf::from(home)
                .join(".config")
                .join("authorship-proof")
                .join("config.toml");
            if candidate.exists() {
                return Self::load_from(&candidate);
            }
        }

        Ok(Self::default())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("PROOF_IPFS_API_URL") {
            self.ipfs.api_url = url;
        }
        if let Some(filter) = lookup("PROOF_LOG") {
            self.logging.filter = filter;
        }
        if let Some(secs) = lookup("PROOF_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.anchor.request_timeout_secs = secs;
        }
        if let Some(secs) =
            lookup("PROOF_CONFIRMATION_TIMEOUT_SECS").and_then(|s| s.parse().ok())
        {
            self.anchor.confirmation_timeout_secs = secs;
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for net in &self.networks {
            if net.id.is_empty() {
                return Err(ProofError::Config("network id must not be empty".into()));
            }
            if !seen.insert(net.id.as_str()) {
                return Err(ProofError::Config(format!("duplicate network id: {}", net.id)));
            }
            if net.kind == NetworkKind::Ethereum && net.chain_id.is_none() {
                return Err(ProofError::Config(format!(
                    "network {} (ethereum) requires chain_id",
                    net.id
                )));
            }
        }
        if self.anchor.request_timeout_secs == 0 || self.anchor.confirmation_timeout_secs == 0 {
            return Err(ProofError::Config("anchor timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn anchor_settings(&self) -> AnchorSettings {
        AnchorSettings {
            request_timeout: Duration::from_secs(self.anchor.request_timeout_secs),
            confirmation_timeout: Duration::from_secs(self.anchor.confirmation_timeout_secs),
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.anchor.poll_interval_ms.max(1))
    }

    /// Build one ledger client per configured network.
    pub fn build_registry(&self, secrets: &dyn SecretProvider) -> Result<LedgerClientRegistry> {
        self.validate()?;
        let mut registry = LedgerClientRegistry::new();
        for net in &self.networks {
            let key = match &net.signer_key_env {
                Some(var) => {
                    let key = secrets.get(var);
                    if key.is_none() {
                        warn!(network = %net.id, env = %var, "Signer key not set, network limited to block references");
                    }
                    key
                }
                None => None,
            };

            let client: Arc<dyn LedgerClient> = match net.kind {
                NetworkKind::Ethereum => {
                    let chain_id = net.chain_id.ok_or_else(|| {
                        ProofError::Config(format!("network {} requires chain_id", net.id))
                    })?;
                    Arc::new(EthereumClient::new(EthereumConfig {
                        rpc_url: net.rpc_url.clone(),
                        chain_id,
                        private_key: key,
                        poll_interval: self.poll_interval(),
                    })?)
                }
                NetworkKind::Bitcoin => Arc::new(BitcoinClient::new(BitcoinConfig {
                    api_url: net.rpc_url.clone(),
                    network: net.network.clone().unwrap_or_else(|| "mainnet".into()),
                    wif_private_key: key,
                    poll_interval: self.poll_interval(),
                })?),
            };
            registry.register(net.id.clone(), client);
        }
        Ok(registry)
    }

    /// IPFS store, or `None` when no API URL is configured.
    pub fn build_content_store(&self) -> Result<Option<Arc<dyn ContentStore>>> {
        if self.ipfs.api_url.is_empty() {
            return Ok(None);
        }
        let store = IpfsStore::new(IpfsConfig {
            api_url: self.ipfs.api_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.anchor.request_timeout_secs),
        })?;
        Ok(Some(Arc::new(store)))
    }

    pub fn build_signer(&self, secrets: &dyn SecretProvider) -> Result<Arc<dyn ProofSigner>> {
        let secret = secrets.signing_secret()?;
        Ok(match self.signing.scheme {
            SigningScheme::KeyedHash => Arc::new(KeyedHashSigner::new(&secret)?),
            SigningScheme::Ed25519 => Arc::new(Ed25519ProofSigner::from_secret_hex(&secret)?),
        })
    }
}

// Secrets

/// Source of key material.
pub trait SecretProvider: Send + Sync {
    fn get(&self, name: &str) -> Option<SecretString>;

    fn signing_secret(&self) -> Result<SecretString> {
        self.get(SIGNING_SECRET_ENV)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProofError::Config(format!("{SIGNING_SECRET_ENV} is not set")))
    }
}

/// Reads secrets from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn get(&self, name: &str) -> Option<SecretString> {
        std::env::var(name).ok().map(SecretString::new)
    }
}
