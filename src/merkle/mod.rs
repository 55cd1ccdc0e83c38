/// Merkle commitments over batches of verification hashes.
pub mod proof;
pub mod tree;

pub use proof::{verify_encoded, verify_proof, MerkleCommitment, MerkleProof, Position};
pub use tree::MerkleTree;
