//! Insertion-order-preserving binary Merkle tree.
//!
//! Leaves are hashed with SHA-256 via [`Hashable::merkle_hash`]; internal
//! nodes are SHA-256 of the concatenation of their two children. A trailing
//! odd node is duplicated, matching Bitcoin's tree construction.

use sha2::{Digest, Sha256};
use shared::Result;

use crate::transaction::Hashable;

/// A Merkle tree over an ordered list of values, retaining the original
/// values so callers can re-walk them in insertion order.
pub struct MerkleTree<T: Hashable> {
    values: Vec<T>,
    leaves: Vec<[u8; 32]>,
    root: [u8; 32],
}

fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn build_root(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    if level.is_empty() {
        return [0u8; 32];
    }
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| node_hash(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

impl<T: Hashable> MerkleTree<T> {
    /// Builds a tree from `values`, preserving their given order.
    pub fn new(values: Vec<T>) -> Result<Self> {
        let leaves = values
            .iter()
            .map(|v| v.merkle_hash())
            .collect::<Result<Vec<_>>>()?;
        let root = build_root(leaves.clone());
        Ok(Self {
            values,
            leaves,
            root,
        })
    }

    /// The root hash, hex-encoded with a `0x` prefix.
    pub fn root_hex(&self) -> String {
        format!("0x{}", hex::encode(self.root))
    }

    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    /// The original values, in insertion order.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Recomputes the root from the current leaves and checks it matches
    /// `self.root` — guards against leaves being mutated after construction
    /// (not possible through the public API today, but cheap to check).
    pub fn verify(&self) -> bool {
        build_root(self.leaves.clone()) == self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Clone)]
    struct Leaf(u32);

    impl Hashable for Leaf {
        fn merkle_hash(&self) -> Result<[u8; 32]> {
            let mut hasher = Sha256::new();
            hasher.update(self.0.to_be_bytes());
            Ok(hasher.finalize().into())
        }

        fn merkle_eq(&self, other: &Self) -> bool {
            self.0 == other.0
        }
    }

    #[test]
    fn single_leaf_root_equals_its_own_hash() {
        let tree = MerkleTree::new(vec![Leaf(1)]).unwrap();
        assert_eq!(tree.root(), Leaf(1).merkle_hash().unwrap());
        assert!(tree.verify());
    }

    #[test]
    fn odd_count_duplicates_the_trailing_leaf() {
        let three = MerkleTree::new(vec![Leaf(1), Leaf(2), Leaf(3)]).unwrap();
        let four = MerkleTree::new(vec![Leaf(1), Leaf(2), Leaf(3), Leaf(3)]).unwrap();
        assert_eq!(three.root(), four.root());
    }

    #[test]
    fn order_affects_the_root() {
        let a = MerkleTree::new(vec![Leaf(1), Leaf(2)]).unwrap();
        let b = MerkleTree::new(vec![Leaf(2), Leaf(1)]).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn empty_tree_has_a_zero_root() {
        let tree: MerkleTree<Leaf> = MerkleTree::new(vec![]).unwrap();
        assert_eq!(tree.root(), [0u8; 32]);
    }
}
