//! State roots

use serde::{Deserialize, Serialize};
use tidepool_merkle::{
    empty_root, short_hex, Keccak256Hasher, BALANCES_HEIGHT, BURNS_HEIGHT, LIQUIDITIES_HEIGHT,
    POOLS_HEIGHT,
};

use crate::types::Field;

/// The four roots summarizing the whole rollup state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateRoots {
    /// Balances tree root
    pub balances: Field,
    /// Liquidities tree root
    pub liquidities: Field,
    /// Pools tree root
    pub pools: Field,
    /// Burns tree root
    pub burns: Field,
}

impl StateRoots {
    /// Roots of four empty trees
    pub fn empty() -> Self {
        Self {
            balances: empty_root(BALANCES_HEIGHT),
            liquidities: empty_root(LIQUIDITIES_HEIGHT),
            pools: empty_root(POOLS_HEIGHT),
            burns: empty_root(BURNS_HEIGHT),
        }
    }

    /// Roots concatenated in field order
    pub fn to_bytes(&self) -> [u8; 128] {
        let mut bytes = [0u8; 128];
        bytes[..32].copy_from_slice(&self.balances);
        bytes[32..64].copy_from_slice(&self.liquidities);
        bytes[64..96].copy_from_slice(&self.pools);
        bytes[96..].copy_from_slice(&self.burns);
        bytes
    }

    /// Single commitment over all four roots
    pub fn hash(&self) -> Field {
        Keccak256Hasher::hash(&self.to_bytes())
    }

    /// Short form for logs
    pub fn short(&self) -> String {
        short_hex(&self.hash())
    }
}

impl Default for StateRoots {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roots_differ_by_height() {
        let roots = StateRoots::empty();
        assert_ne!(roots.balances, roots.liquidities);
        assert_ne!(roots.pools, roots.burns);
        assert_eq!(roots, StateRoots::default());
    }

    #[test]
    fn test_equality_is_per_field() {
        let a = StateRoots::empty();
        let mut b = a;
        b.burns = [1u8; 32];
        assert_ne!(a, b);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(&b.to_bytes()[96..], &[1u8; 32]);
    }
}
