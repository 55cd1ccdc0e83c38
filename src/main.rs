use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::error;

use authorship_proof::anchor::AnchorService;
use authorship_proof::config::{EngineConfig, EnvSecretProvider};
use authorship_proof::error::{ProofError, Result};
use authorship_proof::fingerprint::{fingerprint_file, WorkMetadata};
use authorship_proof::pipeline::{IssueOptions, ProofEngine, VerificationLevel};
use authorship_proof::proof::VerificationProof;
use authorship_proof::verify::{MerkleContext, Verifier};

#[derive(Parser)]
#[command(name = "authorship-proof")]
#[command(about = "Issue and verify anchored proofs of authorship")]
#[command(version)]
struct Cli {
    /// Config file (defaults to authorship-proof.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SHA-256 fingerprint of a file
    Fingerprint { file: PathBuf },
    /// Issue a proof for a file
    Issue {
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long)]
        creator: String,
        #[arg(long = "collaborator")]
        collaborators: Vec<String>,
        #[arg(long)]
        certificate_id: String,
        /// Configured network id
        #[arg(long)]
        network: String,
        #[arg(long, default_value = "standard")]
        level: VerificationLevel,
        /// Print the full audit record instead of the bare proof
        #[arg(long)]
        audit: bool,
    },
    /// Verify a proof file
    Verify {
        proof: PathBuf,
        /// Original file, enables the file hash check
        #[arg(long)]
        file: Option<PathBuf>,
        /// Batch Merkle root, enables the cryptographic Merkle check
        #[arg(long, requires = "verification_hash")]
        merkle_root: Option<String>,
        /// Verification hash of the work (the Merkle leaf)
        #[arg(long, requires = "merkle_root")]
        verification_hash: Option<String>,
    },
    /// Show the head block of every configured network
    Networks,
}

fn init_logging(cfg: &EngineConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ProofError::Serialization(e.to_string()))?;
    println!("{text}");
    Ok(())
}

async fn run(cli: Cli, cfg: EngineConfig) -> Result<()> {
    let secrets = EnvSecretProvider;

    match cli.command {
        Commands::Fingerprint { file } => {
            let bytes = tokio::fs::read(&file).await?;
            print_json(&json!({
                "file": file.display().to_string(),
                "fileHash": fingerprint_file(&bytes),
            }))
        }
        Commands::Issue {
            file,
            title,
            creator,
            collaborators,
            certificate_id,
            network,
            level,
            audit,
        } => {
            let bytes = tokio::fs::read(&file).await?;
            let metadata = WorkMetadata {
                title,
                creator,
                collaborators,
                certificate_id,
            };
            let engine = ProofEngine::new(
                AnchorService::new(cfg.build_registry(&secrets)?, cfg.anchor_settings()),
                cfg.build_signer(&secrets)?,
                cfg.build_content_store()?,
            );
            let options = IssueOptions {
                network_id: network,
                verification_level: level,
            };
            let issued = engine
                .issue_proof_with_audit(&bytes, &metadata, &options)
                .await?;
            if audit {
                print_json(&issued)
            } else {
                print_json(&issued.proof)
            }
        }
        Commands::Verify {
            proof,
            file,
            merkle_root,
            verification_hash,
        } => {
            let text = tokio::fs::read_to_string(&proof).await?;
            let proof = VerificationProof::from_json(&text)?;
            let bytes = match &file {
                Some(path) => Some(tokio::fs::read(path).await?),
                None => None,
            };
            let verifier = Verifier::new(cfg.build_signer(&secrets)?);
            let result = match (merkle_root, verification_hash) {
                (Some(root), Some(leaf)) => {
                    verifier.verify_with_root(&proof, bytes.as_deref(), &MerkleContext { leaf, root })
                }
                _ => verifier.verify(&proof, bytes.as_deref()),
            };
            print_json(&result)
        }
        Commands::Networks => {
            let service = AnchorService::new(cfg.build_registry(&secrets)?, cfg.anchor_settings());
            let heads: Vec<_> = service
                .latest_blocks()
                .await
                .into_iter()
                .map(|h| match h.head {
                    Ok(block) => json!({ "network": h.network_id, "head": block }),
                    Err(e) => json!({ "network": h.network_id, "error": e.to_string() }),
                })
                .collect();
            print_json(&heads)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut cfg = match EngineConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("authorship-proof: {e}");
            std::process::exit(2);
        }
    };
    cfg.apply_env();
    init_logging(&cfg);

    if let Err(e) = run(cli, cfg).await {
        error!(error = %e, "Command failed");
        eprintln!("authorship-proof: {e}");
        std::process::exit(1);
    }
}
