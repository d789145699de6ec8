//! Fixed-height Merkle trees and witnesses for the rollup state
//!
//! Every state tree is a binary Keccak256 tree of a fixed height whose
//! untouched leaves hold [`EMPTY_LEAF`]. Transitions never see the trees
//! themselves, only witnesses:
//! - [`SingleWitness`]: the path of one leaf
//! - [`DoubleWitness`]: two paths folded into one root after both leaves change
//!
//! [`MerkleTree`] is the sparse off-chain tree that hands those witnesses out.

mod hasher;
mod tree;
mod witness;

pub use hasher::Keccak256Hasher;
pub use tree::MerkleTree;
pub use witness::{merge_flags, merge_level, DoubleWitness, Sibling, SingleWitness};

/// 32-byte field element or node hash
pub type Hash = [u8; 32];

/// Value of a leaf that was never written
pub const EMPTY_LEAF: Hash = [0u8; 32];

/// Tallest tree supported; leaf indexes must fit in a `u64`.
pub const MAX_HEIGHT: usize = 64;

/// Height of the balances tree
pub const BALANCES_HEIGHT: usize = 23;
/// Height of the liquidities tree
pub const LIQUIDITIES_HEIGHT: usize = 22;
/// Height of the pools tree
pub const POOLS_HEIGHT: usize = 21;
/// Height of the burns tree
pub const BURNS_HEIGHT: usize = 20;
/// Height of the withdrawals tree, index-aligned with burns
pub const WITHDRAWALS_HEIGHT: usize = 20;

/// Witness and tree errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WitnessError {
    /// Witness path length does not fit the tree
    #[error("witness built for height {actual}, expected {expected}")]
    HeightMismatch {
        /// Height of the tree
        expected: usize,
        /// Height implied by the witness
        actual: usize,
    },
    /// Height zero or above [`MAX_HEIGHT`]
    #[error("unsupported tree height {0}")]
    InvalidHeight(usize),
    /// Leaf index past the last slot
    #[error("leaf index {index} out of range for {capacity} leaves")]
    IndexOutOfRange {
        /// Requested index
        index: u64,
        /// Number of leaf slots
        capacity: u64,
    },
    /// Both paths of a double witness at one leaf
    #[error("double witness needs two distinct leaves, both at {0}")]
    SameIndex(u64),
}

/// Root of a tree of `height` with every leaf empty.
pub fn empty_root(height: usize) -> Hash {
    let mut node = EMPTY_LEAF;
    for _ in 1..height {
        node = Keccak256Hasher::hash_pair(&node, &node);
    }
    node
}

/// Lowercase hex rendering used in logs.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root() {
        assert_eq!(empty_root(1), EMPTY_LEAF);
        let z1 = Keccak256Hasher::hash_pair(&EMPTY_LEAF, &EMPTY_LEAF);
        assert_eq!(empty_root(2), z1);
        assert_eq!(empty_root(3), Keccak256Hasher::hash_pair(&z1, &z1));
    }

    #[test]
    fn test_empty_tree_matches_empty_root() {
        for height in [1, 2, 5, BURNS_HEIGHT, BALANCES_HEIGHT] {
            let tree = MerkleTree::new(height).unwrap();
            assert_eq!(tree.root(), empty_root(height));
        }
    }

    #[test]
    fn test_insert_and_witness() {
        let mut tree = MerkleTree::new(POOLS_HEIGHT).unwrap();
        let value = [2u8; 32];
        tree.set_leaf(12345, value).unwrap();

        let witness = tree.single_witness(12345).unwrap();
        assert_eq!(witness.calculate_index(), 12345);
        assert_eq!(witness.calculate_root(&value), tree.root());
        assert_ne!(witness.calculate_root(&EMPTY_LEAF), tree.root());
    }
}
