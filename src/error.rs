use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Merkle tree requires at least one leaf")]
    EmptyInput,

    #[error("Ledger network '{network}' unavailable: {reason}")]
    AnchorUnavailable { network: String, reason: String },

    #[error("Unknown ledger network: {0}")]
    UnknownNetwork(String),

    /// Cancelled during or after transaction submission. The transaction may
    /// still confirm, so it is reported rather than resubmitted.
    #[error("Anchor cancelled on '{network}' with a transaction in flight ({})", .tx_hash.as_deref().unwrap_or("hash unknown"))]
    AnchorInFlight {
        network: String,
        tx_hash: Option<String>,
    },

    #[error("Anchor cancelled on '{0}' before submission")]
    AnchorCancelled(String),

    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Content store error: {0}")]
    ContentStore(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ProofError>;
