//! Tidepool core state transition logic
//!
//! This crate contains the pure logic shared by everything that advances or
//! checks rollup state:
//! - Leaf records and the four state roots
//! - Constant-product AMM arithmetic
//! - The transition methods and proof merging
//!
//! Nothing here performs I/O. Proof and signature checks are injected through
//! [`ProofVerifier`] and [`SignatureVerifier`].

pub mod dex;
pub mod error;
pub mod leaves;
pub mod proof;
pub mod signature;
pub mod state;
pub mod transition;
pub mod types;

pub use error::{StateTree, TransitionError};
pub use leaves::{leaf_or_empty, next_deposit_head, Balance, Burn, Deposit, Leaf, Liquidity, Pool, Withdrawal};
pub use proof::{MethodKind, Proof, ProofVerifier};
pub use signature::{sign_fields, KeyRegistry, Signature, SignatureVerifier};
pub use state::StateRoots;
pub use transition::{
    merge_proofs, BurnArgs, Context, CreatePoolArgs, DepositArgs, LeafValue, LeafWrite, Outcome,
    ProvideLiquidityArgs, RemoveLiquidityArgs, SwapArgs, Transition,
};
pub use types::*;
