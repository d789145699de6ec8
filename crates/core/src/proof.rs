//! Proof certificates

use serde::{Deserialize, Serialize};

use crate::state::StateRoots;

/// Method a proof attests to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Chain anchor
    Genesis,
    /// Bridge deposit replay
    Deposit,
    /// Burn for withdrawal
    Burn,
    /// Pool creation
    CreatePool,
    /// Liquidity added
    ProvideLiquidity,
    /// Liquidity removed
    RemoveLiquidity,
    /// Base bought with quote
    Buy,
    /// Base sold for quote
    Sell,
    /// Two chained proofs combined
    Merge,
}

impl MethodKind {
    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genesis => "genesis",
            Self::Deposit => "deposit",
            Self::Burn => "burn",
            Self::CreatePool => "create_pool",
            Self::ProvideLiquidity => "provide_liquidity",
            Self::RemoveLiquidity => "remove_liquidity",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Merge => "merge",
        }
    }

    /// Stable tag bound into attestations
    pub fn tag(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate that `public_input` was advanced to `public_output`.
///
/// `payload` is opaque to everything but the backend that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Method that produced the proof
    pub method: MethodKind,
    /// Roots before
    pub public_input: StateRoots,
    /// Roots after
    pub public_output: StateRoots,
    /// Backend data
    pub payload: Vec<u8>,
}

/// Backend-specific proof check
pub trait ProofVerifier: Send + Sync {
    /// Whether `proof` was produced by this backend
    fn verify(&self, proof: &Proof) -> bool;
}
