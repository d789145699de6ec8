//! Single- and double-leaf Merkle witnesses

use serde::{Deserialize, Serialize};

use crate::{hasher::Keccak256Hasher, Hash, WitnessError};

/// One step of a witness path.
///
/// `is_left` is set when the sibling sits on the left, i.e. the node being
/// folded is a right child at this level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sibling {
    /// Sibling node hash
    pub value: Hash,
    /// Sibling is the left child
    pub is_left: bool,
}

impl Sibling {
    fn fold(&self, node: &Hash) -> Hash {
        self.fold_with(node, &self.value)
    }

    fn fold_with(&self, node: &Hash, sibling: &Hash) -> Hash {
        if self.is_left {
            Keccak256Hasher::hash_pair(sibling, node)
        } else {
            Keccak256Hasher::hash_pair(node, sibling)
        }
    }
}

/// Witness for a single leaf: siblings ordered from the leaf up to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleWitness {
    /// Leaf to root
    pub siblings: Vec<Sibling>,
}

impl SingleWitness {
    /// Witness from a sibling path
    pub fn new(siblings: Vec<Sibling>) -> Self {
        Self { siblings }
    }

    /// Height of the tree this witness belongs to.
    pub fn height(&self) -> usize {
        self.siblings.len() + 1
    }

    /// Fails unless this witness was built for a tree of `height`.
    pub fn check_height(&self, height: usize) -> Result<(), WitnessError> {
        if self.height() != height {
            return Err(WitnessError::HeightMismatch {
                expected: height,
                actual: self.height(),
            });
        }
        Ok(())
    }

    /// Fold `leaf` up to a candidate root.
    pub fn calculate_root(&self, leaf: &Hash) -> Hash {
        self.siblings
            .iter()
            .fold(*leaf, |node, sibling| sibling.fold(&node))
    }

    /// Leaf index encoded by the orientation bits.
    pub fn calculate_index(&self) -> u64 {
        index_from_bits(self.siblings.iter().map(|s| s.is_left))
    }
}

/// Witness for two distinct leaves of the same tree.
///
/// `siblings_at` flags the level where both paths meet as mutual siblings.
/// At that level the first path uses the second path's running root instead
/// of its stored sibling, so a single fold yields the root after both leaves
/// changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleWitness {
    /// Path of the first leaf
    pub siblings_x1: Vec<Sibling>,
    /// Path of the second leaf
    pub siblings_x2: Vec<Sibling>,
    /// Level at which the second path replaces the first path's sibling
    pub siblings_at: Vec<bool>,
}

impl DoubleWitness {
    /// Witness from two paths and their merge flags
    pub fn new(siblings_x1: Vec<Sibling>, siblings_x2: Vec<Sibling>, siblings_at: Vec<bool>) -> Self {
        Self {
            siblings_x1,
            siblings_x2,
            siblings_at,
        }
    }

    /// Both paths and the flags must have `height - 1` entries.
    pub fn check_height(&self, height: usize) -> Result<(), WitnessError> {
        let expected = height.saturating_sub(1);
        for actual in [
            self.siblings_x1.len(),
            self.siblings_x2.len(),
            self.siblings_at.len(),
        ] {
            if actual != expected {
                return Err(WitnessError::HeightMismatch {
                    expected: height,
                    actual: actual + 1,
                });
            }
        }
        Ok(())
    }

    /// Root of the tree holding `value_x1` and `value_x2` at the two paths.
    ///
    /// The flags are taken as supplied. See [`DoubleWitness::expected_flags`].
    pub fn calculate_root(&self, value_x1: &Hash, value_x2: &Hash) -> Hash {
        let mut root_x1 = *value_x1;
        let mut root_x2 = *value_x2;

        for ((sibling_x1, sibling_x2), &at) in self
            .siblings_x1
            .iter()
            .zip(&self.siblings_x2)
            .zip(&self.siblings_at)
        {
            root_x1 = if at {
                sibling_x1.fold_with(&root_x1, &root_x2)
            } else {
                sibling_x1.fold(&root_x1)
            };
            root_x2 = sibling_x2.fold(&root_x2);
        }

        root_x1
    }

    /// Leaf indexes of the two paths
    pub fn calculate_indexes(&self) -> (u64, u64) {
        (
            index_from_bits(self.siblings_x1.iter().map(|s| s.is_left)),
            index_from_bits(self.siblings_x2.iter().map(|s| s.is_left)),
        )
    }

    /// Flags derived from the two path indexes rather than trusted input.
    pub fn expected_flags(&self) -> Vec<bool> {
        let (index_x1, index_x2) = self.calculate_indexes();
        merge_flags(index_x1, index_x2, self.siblings_x1.len())
    }
}

/// Level at which leaves `a` and `b` become siblings, `None` when equal.
pub fn merge_level(a: u64, b: u64) -> Option<usize> {
    let diff = a ^ b;
    if diff == 0 {
        None
    } else {
        Some(63 - diff.leading_zeros() as usize)
    }
}

/// Flag vector with only the merge level of `a` and `b` set.
pub fn merge_flags(a: u64, b: u64, levels: usize) -> Vec<bool> {
    let level = merge_level(a, b);
    (0..levels).map(|i| Some(i) == level).collect()
}

fn index_from_bits(bits: impl Iterator<Item = bool>) -> u64 {
    bits.enumerate()
        .filter(|(_, is_left)| *is_left)
        .fold(0u64, |index, (i, _)| index | 1u64.checked_shl(i as u32).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(bits: &[bool]) -> Vec<Sibling> {
        bits.iter()
            .enumerate()
            .map(|(i, &is_left)| Sibling {
                value: [i as u8 + 1; 32],
                is_left,
            })
            .collect()
    }

    #[test]
    fn test_index_from_orientation() {
        let witness = SingleWitness::new(path(&[true, false, true]));
        assert_eq!(witness.calculate_index(), 5);
        assert_eq!(witness.height(), 4);

        let witness = SingleWitness::new(path(&[false, false, false]));
        assert_eq!(witness.calculate_index(), 0);
    }

    #[test]
    fn test_single_root_orders_pairs() {
        let leaf = [9u8; 32];
        let sibling = Sibling {
            value: [7u8; 32],
            is_left: true,
        };
        let witness = SingleWitness::new(vec![sibling]);
        assert_eq!(
            witness.calculate_root(&leaf),
            Keccak256Hasher::hash_pair(&[7u8; 32], &leaf)
        );
    }

    #[test]
    fn test_check_height() {
        let witness = SingleWitness::new(path(&[false; 3]));
        assert!(witness.check_height(4).is_ok());
        assert!(matches!(
            witness.check_height(5),
            Err(WitnessError::HeightMismatch { expected: 5, actual: 4 })
        ));
    }

    #[test]
    fn test_merge_level() {
        assert_eq!(merge_level(0, 1), Some(0));
        assert_eq!(merge_level(3, 4), Some(2));
        assert_eq!(merge_level(4, 6), Some(1));
        assert_eq!(merge_level(7, 7), None);
        assert_eq!(merge_flags(3, 4, 3), vec![false, false, true]);
    }

    #[test]
    fn test_double_witness_shape() {
        let witness = DoubleWitness::new(
            path(&[true, true, false]),
            path(&[false, false, true]),
            vec![false, false, true],
        );
        assert!(witness.check_height(4).is_ok());
        assert_eq!(witness.calculate_indexes(), (3, 4));
        assert_eq!(witness.expected_flags(), witness.siblings_at);

        let short = DoubleWitness::new(path(&[true]), path(&[false, true]), vec![true, false]);
        assert!(short.check_height(3).is_err());
    }
}
