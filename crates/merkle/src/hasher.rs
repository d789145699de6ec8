//! Keccak256 hasher for the fixed-height trees

use tiny_keccak::{Hasher, Keccak};

use crate::Hash;

/// Keccak256 hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256Hasher;

impl Keccak256Hasher {
    /// Hash two 32-byte values together
    pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(left);
        hasher.update(right);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Hash a single value
    pub fn hash(data: &[u8]) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(data);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Hash a record given as a sequence of 32-byte field elements.
    pub fn hash_fields(fields: &[Hash]) -> Hash {
        let mut hasher = Keccak::v256();
        for field in fields {
            hasher.update(field);
        }
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }
}

/// Hashes of empty subtrees, `zeros[0]` being the empty leaf.
pub(crate) fn zero_hashes(height: usize) -> Vec<Hash> {
    let mut zeros = Vec::with_capacity(height);
    let mut current = crate::EMPTY_LEAF;
    for _ in 0..height {
        zeros.push(current);
        current = Keccak256Hasher::hash_pair(&current, &current);
    }
    zeros
}
