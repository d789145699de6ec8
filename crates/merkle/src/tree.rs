//! Sparse fixed-height Merkle tree

use std::collections::HashMap;

use crate::{
    hasher::{zero_hashes, Keccak256Hasher},
    witness::merge_flags,
    DoubleWitness, Hash, Sibling, SingleWitness, WitnessError, MAX_HEIGHT,
};

/// Merkle tree of a fixed height storing only non-empty nodes.
///
/// Level 0 holds the leaves and level `height - 1` the root, so the tree has
/// `2^(height - 1)` leaf slots.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    height: usize,
    /// (level, index) -> hash, absent entries are empty subtrees
    nodes: HashMap<(usize, u64), Hash>,
    zeros: Vec<Hash>,
}

impl MerkleTree {
    /// Create an empty tree
    pub fn new(height: usize) -> Result<Self, WitnessError> {
        if height == 0 || height > MAX_HEIGHT {
            return Err(WitnessError::InvalidHeight(height));
        }
        Ok(Self {
            height,
            nodes: HashMap::new(),
            zeros: zero_hashes(height),
        })
    }

    /// Number of levels, leaves and root included
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of leaf slots
    pub fn capacity(&self) -> u64 {
        1u64 << (self.height - 1)
    }

    /// Current root
    pub fn root(&self) -> Hash {
        self.node(self.height - 1, 0)
    }

    /// Current value of a leaf, [`crate::EMPTY_LEAF`] if never written.
    pub fn leaf(&self, index: u64) -> Hash {
        self.node(0, index)
    }

    /// Write a leaf and rehash its path.
    pub fn set_leaf(&mut self, index: u64, value: Hash) -> Result<(), WitnessError> {
        self.check_index(index)?;

        self.put(0, index, value);
        let mut current = value;
        let mut position = index;
        for level in 0..self.height - 1 {
            let sibling = self.node(level, position ^ 1);
            current = if position & 1 == 1 {
                Keccak256Hasher::hash_pair(&sibling, &current)
            } else {
                Keccak256Hasher::hash_pair(&current, &sibling)
            };
            position >>= 1;
            self.put(level + 1, position, current);
        }
        Ok(())
    }

    /// Witness for the leaf at `index` against the current root.
    pub fn single_witness(&self, index: u64) -> Result<SingleWitness, WitnessError> {
        self.check_index(index)?;
        Ok(SingleWitness::new(self.path(index)))
    }

    /// Witness for two distinct leaves against the current root.
    pub fn double_witness(&self, index_x1: u64, index_x2: u64) -> Result<DoubleWitness, WitnessError> {
        self.check_index(index_x1)?;
        self.check_index(index_x2)?;
        if index_x1 == index_x2 {
            return Err(WitnessError::SameIndex(index_x1));
        }
        Ok(DoubleWitness::new(
            self.path(index_x1),
            self.path(index_x2),
            merge_flags(index_x1, index_x2, self.height - 1),
        ))
    }

    fn path(&self, index: u64) -> Vec<Sibling> {
        let mut position = index;
        (0..self.height - 1)
            .map(|level| {
                let sibling = Sibling {
                    value: self.node(level, position ^ 1),
                    is_left: position & 1 == 1,
                };
                position >>= 1;
                sibling
            })
            .collect()
    }

    fn node(&self, level: usize, index: u64) -> Hash {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or(self.zeros[level])
    }

    fn put(&mut self, level: usize, index: u64, hash: Hash) {
        if hash == self.zeros[level] {
            self.nodes.remove(&(level, index));
        } else {
            self.nodes.insert((level, index), hash);
        }
    }

    fn check_index(&self, index: u64) -> Result<(), WitnessError> {
        if index >= self.capacity() {
            return Err(WitnessError::IndexOutOfRange {
                index,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}
