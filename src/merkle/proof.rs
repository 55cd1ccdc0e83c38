/// Merkle inclusion proof generation and verification.
///
/// On the wire a proof is an ordered list of strings, one per level, each
/// the sibling digest tagged with the side it sits on: `"L:<hex>"` or
/// `"R:<hex>"`. Folding always respects the tag, so verification applies the
/// same positional order used when the tree was built.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tree::{internal_hash, MerkleTree};
use crate::crypto::hash;

/// Position of a sibling in a Merkle proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Left,
    Right,
}

impl Position {
    fn tag(self) -> &'static str {
        match self {
            Position::Left => "L",
            Position::Right => "R",
        }
    }
}

/// A Merkle inclusion proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: [u8; 32],
    pub siblings: Vec<(Position, [u8; 32])>,
}

impl MerkleProof {
    /// Wire encoding of the sibling path.
    pub fn encode(&self) -> Vec<String> {
        self.siblings
            .iter()
            .map(|(position, sibling)| format!("{}:{}", position.tag(), hex::encode(sibling)))
            .collect()
    }
}

/// Parse one wire element. `None` if the tag or digest is malformed.
pub fn decode_sibling(element: &str) -> Option<(Position, [u8; 32])> {
    let (tag, digest) = element.split_once(':')?;
    let position = match tag {
        "L" => Position::Left,
        "R" => Position::Right,
        _ => return None,
    };
    Some((position, hash::parse_digest(digest)?))
}

/// Parse a whole wire path. `None` if any element is malformed.
pub fn decode_path(path: &[String]) -> Option<Vec<(Position, [u8; 32])>> {
    path.iter().map(|e| decode_sibling(e)).collect()
}

/// Batch commitment: root, ordered leaves, and the encoded proof of each leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleCommitment {
    pub root: String,
    pub leaves: Vec<String>,
    /// Leaf hex → encoded sibling path. Duplicate leaves share one entry.
    pub proofs: BTreeMap<String, Vec<String>>,
}

impl MerkleTree {
    /// Generate an inclusion proof for the leaf at `index`.
    pub fn prove(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut siblings = Vec::new();
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_idx, position) = if idx % 2 == 0 {
                // A trailing odd node is its own right sibling
                ((idx + 1).min(level.len() - 1), Position::Right)
            } else {
                (idx - 1, Position::Left)
            };
            siblings.push((position, level[sibling_idx]));
            idx /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            leaf_hash: self.leaves()[index],
            siblings,
        })
    }

    /// Root, leaves and per-leaf proofs in wire form.
    pub fn commitment(&self) -> MerkleCommitment {
        let leaves: Vec<String> = self.leaves().iter().map(hex::encode).collect();
        let mut proofs = BTreeMap::new();
        for (index, leaf) in leaves.iter().enumerate() {
            if let Some(proof) = self.prove(index) {
                proofs.entry(leaf.clone()).or_insert_with(|| proof.encode());
            }
        }

        MerkleCommitment {
            root: self.root_hex(),
            leaves,
            proofs,
        }
    }
}

/// Fold a leaf up a sibling path.
pub fn compute_root(leaf: &[u8; 32], siblings: &[(Position, [u8; 32])]) -> [u8; 32] {
    siblings
        .iter()
        .fold(*leaf, |current, (position, sibling)| match position {
            Position::Left => internal_hash(sibling, &current),
            Position::Right => internal_hash(&current, sibling),
        })
}

/// Verify a Merkle inclusion proof against a known root.
pub fn verify_proof(root: &[u8; 32], proof: &MerkleProof) -> bool {
    &compute_root(&proof.leaf_hash, &proof.siblings) == root
}

/// Verify a wire-form proof. Any malformed input is a failed verification.
pub fn verify_encoded(leaf_hex: &str, path: &[String], root_hex: &str) -> bool {
    let (Some(leaf), Some(root)) = (hash::parse_digest(leaf_hex), hash::parse_digest(root_hex))
    else {
        return false;
    };
    match decode_path(path) {
        Some(siblings) => compute_root(&leaf, &siblings) == root,
        None => false,
    }
}
