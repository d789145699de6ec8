//! Transition errors

use tidepool_merkle::WitnessError;

/// Tree or accumulator whose commitment failed to match
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateTree {
    /// User token balances
    Balances,
    /// Liquidity points per provider and pair
    Liquidities,
    /// Pool reserves
    Pools,
    /// Cumulative burns
    Burns,
    /// Cumulative bridge payouts
    Withdrawals,
    /// Bridge deposit hash chain
    Deposits,
}

impl std::fmt::Display for StateTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Balances => "balances",
            Self::Liquidities => "liquidities",
            Self::Pools => "pools",
            Self::Burns => "burns",
            Self::Withdrawals => "withdrawals",
            Self::Deposits => "deposits",
        };
        f.write_str(name)
    }
}

/// Why a transition or merge was rejected. None of these leave partial state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Missing earlier proof, or one ending elsewhere
    #[error("earlier proof does not chain onto the asserted roots")]
    ChainMismatch,
    /// Earlier proof rejected by the verifier
    #[error("earlier proof failed verification")]
    ProofInvalid,
    /// Witness of the wrong height or shape
    #[error("invalid witness: {0}")]
    InvalidWitness(#[from] WitnessError),
    /// Two witnesses at the same leaf
    #[error("witnesses disagree on leaf position")]
    IndexMismatch,
    /// Signature not by the claimed signer
    #[error("signature does not verify")]
    SignatureInvalid,
    /// Claimed leaf and witness do not give the asserted root
    #[error("{0} root does not match the supplied witness")]
    StateMismatch(StateTree),
    /// Result does not fit
    #[error("arithmetic overflow")]
    Overflow,
    /// Result would go negative
    #[error("arithmetic underflow")]
    Underflow,
    /// Price moved past the caller's limit
    #[error("slippage limit exceeded: limit {limit}, actual {actual}")]
    SlippageExceeded {
        /// Most the caller accepted
        limit: u64,
        /// What the trade would take
        actual: u64,
    },
    /// An amount that must be positive was zero
    #[error("{0} must be nonzero")]
    ZeroAmount(&'static str),
}

/// Result of a transition check
pub type Result<T, E = TransitionError> = std::result::Result<T, E>;
