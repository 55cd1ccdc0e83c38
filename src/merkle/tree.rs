/// SHA-256 Merkle tree over fingerprint leaves.
///
/// Leaves are already digests (verification hashes), so they enter the tree
/// as-is and a single-leaf tree has `root == leaf`. Parents are
/// domain-separated from leaves:
///   internal_hash(l, r) = SHA-256(0x01 || l || r)
///
/// Children are combined in positional order. If a level has an odd number
/// of nodes, the last node is paired with itself. Proof generation and
/// verification both follow this rule.
use crate::crypto::hash;
use crate::error::{ProofError, Result};

const INTERNAL_PREFIX: u8 = 0x01;

/// Hash two child nodes to produce a parent.
pub fn internal_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut input = Vec::with_capacity(1 + 64);
    input.push(INTERNAL_PREFIX);
    input.extend_from_slice(left);
    input.extend_from_slice(right);
    hash::sha256(&input)
}

/// A Merkle tree with every level retained for proof generation.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] = leaves, levels[last] = [root].
    pub(crate) levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree from leaf digests, in the given order.
    pub fn build(leaves: Vec<[u8; 32]>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(ProofError::EmptyInput);
        }

        let mut levels = vec![leaves];

        loop {
            let current = &levels[levels.len() - 1];
            if current.len() <= 1 {
                break;
            }

            let next: Vec<[u8; 32]> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    // Odd node: paired with itself
                    let right = pair.get(1).unwrap_or(left);
                    internal_hash(left, right)
                })
                .collect();

            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Build from hex-encoded leaf digests.
    pub fn from_hex_leaves(leaves: &[String]) -> Result<Self> {
        let parsed = leaves
            .iter()
            .map(|leaf| {
                hash::parse_digest(leaf).ok_or_else(|| {
                    ProofError::Serialization(format!("Leaf is not a 32-byte hex digest: {leaf}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::build(parsed)
    }

    pub fn root(&self) -> [u8; 32] {
        // build() guarantees at least one level with one node at the top
        self.levels[self.levels.len() - 1][0]
    }

    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaves(&self) -> &[[u8; 32]] {
        &self.levels[0]
    }

    /// All levels (for debugging/testing).
    pub fn levels(&self) -> &[Vec<[u8; 32]>] {
        &self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(data: &[u8]) -> [u8; 32] {
        hash::sha256(data)
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let tree = MerkleTree::build(vec![leaf(b"hello")]).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.root(), leaf(b"hello"));
        assert_eq!(tree.levels().len(), 1);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(MerkleTree::build(vec![]), Err(ProofError::EmptyInput)));
    }

    #[test]
    fn test_two_leaves() {
        let tree = MerkleTree::build(vec![leaf(b"a"), leaf(b"b")]).unwrap();
        assert_eq!(tree.root(), internal_hash(&leaf(b"a"), &leaf(b"b")));
    }

    #[test]
    fn test_positional_order_matters() {
        let ab = MerkleTree::build(vec![leaf(b"a"), leaf(b"b")]).unwrap();
        let ba = MerkleTree::build(vec![leaf(b"b"), leaf(b"a")]).unwrap();
        assert_ne!(ab.root(), ba.root());
    }

    #[test]
    fn test_three_leaves_duplicates_last() {
        let three = MerkleTree::build(vec![leaf(b"a"), leaf(b"b"), leaf(b"c")]).unwrap();
        // Level 1: [H(a||b), H(c||c)]
        let h_ab = internal_hash(&leaf(b"a"), &leaf(b"b"));
        let h_cc = internal_hash(&leaf(b"c"), &leaf(b"c"));
        assert_eq!(three.root(), internal_hash(&h_ab, &h_cc));

        // Same root as the explicit four-leaf tree [a, b, c, c]
        let four =
            MerkleTree::build(vec![leaf(b"a"), leaf(b"b"), leaf(b"c"), leaf(b"c")]).unwrap();
        assert_eq!(three.root(), four.root());
    }

    #[test]
    fn test_five_leaves_duplicates_on_every_odd_level() {
        let leaves: Vec<[u8; 32]> = (0..5u8).map(|i| leaf(&[i])).collect();
        let tree = MerkleTree::build(leaves.clone()).unwrap();

        let l1 = [
            internal_hash(&leaves[0], &leaves[1]),
            internal_hash(&leaves[2], &leaves[3]),
            internal_hash(&leaves[4], &leaves[4]),
        ];
        let l2 = [
            internal_hash(&l1[0], &l1[1]),
            internal_hash(&l1[2], &l1[2]),
        ];
        assert_eq!(tree.root(), internal_hash(&l2[0], &l2[1]));
    }

    #[test]
    fn test_from_hex_leaves() {
        let hexes = vec![hex::encode(leaf(b"a")), hex::encode(leaf(b"b"))];
        let tree = MerkleTree::from_hex_leaves(&hexes).unwrap();
        assert_eq!(tree.root(), internal_hash(&leaf(b"a"), &leaf(b"b")));
        assert!(MerkleTree::from_hex_leaves(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let t1 = MerkleTree::build(vec![leaf(b"x"), leaf(b"y"), leaf(b"z")]).unwrap();
        let t2 = MerkleTree::build(vec![leaf(b"x"), leaf(b"y"), leaf(b"z")]).unwrap();
        assert_eq!(t1.root(), t2.root());
    }
}
