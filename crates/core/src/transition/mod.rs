//! State transition methods
//!
//! Each method is a pure function of the asserted roots, the earlier proof it
//! chains onto, and an argument struct carrying every witness, prior leaf
//! value and signature it needs. Checks run in a fixed order:
//! chain anchor, earlier proof, witness shape, signature, roots, arithmetic.
//! Any failure returns an error and no roots.

mod burn;
mod create_pool;
mod deposit;
mod liquidity;
mod merge;
mod swap;

pub use burn::BurnArgs;
pub use create_pool::CreatePoolArgs;
pub use deposit::DepositArgs;
pub use liquidity::{ProvideLiquidityArgs, RemoveLiquidityArgs};
pub use merge::merge_proofs;
pub use swap::SwapArgs;

use serde::{Deserialize, Serialize};
use tidepool_merkle::{DoubleWitness, SingleWitness};

use crate::{
    error::{Result, StateTree, TransitionError},
    leaves::{Balance, Burn, Leaf, Liquidity, Pool},
    proof::{MethodKind, Proof, ProofVerifier},
    signature::{Signature, SignatureVerifier},
    state::StateRoots,
    types::{Address, Amount, Field, TokenId},
};

/// Verification predicates a transition composes with its own checks
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// Checks earlier proofs
    pub proofs: &'a dyn ProofVerifier,
    /// Checks user signatures
    pub signatures: &'a dyn SignatureVerifier,
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

/// New value of one tree leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafValue {
    /// Balances tree leaf
    Balance(Balance),
    /// Burns tree leaf
    Burn(Burn),
    /// Pools tree leaf
    Pool(Pool),
    /// Liquidities tree leaf
    Liquidity(Liquidity),
}

impl LeafValue {
    /// Tree the leaf lives in
    pub fn tree(&self) -> StateTree {
        match self {
            Self::Balance(_) => StateTree::Balances,
            Self::Burn(_) => StateTree::Burns,
            Self::Pool(_) => StateTree::Pools,
            Self::Liquidity(_) => StateTree::Liquidities,
        }
    }

    /// Committed leaf hash
    pub fn hash(&self) -> Field {
        match self {
            Self::Balance(leaf) => leaf.hash(),
            Self::Burn(leaf) => leaf.hash(),
            Self::Pool(leaf) => leaf.hash(),
            Self::Liquidity(leaf) => leaf.hash(),
        }
    }
}

/// A leaf update performed by a transition, indexed by the witness path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafWrite {
    /// Leaf index
    pub index: u64,
    /// Value written
    pub leaf: LeafValue,
}

/// Result of an accepted transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Roots after the step
    pub roots: StateRoots,
    /// Leaves written, in order
    pub writes: Vec<LeafWrite>,
}

/// One proof-checked step of the rollup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Identity step anchoring a chain on settled roots
    Genesis,
    /// Replay one bridge deposit
    Deposit(DepositArgs),
    /// Burn tokens for a later withdrawal
    Burn(BurnArgs),
    /// Open a pool with initial reserves
    CreatePool(CreatePoolArgs),
    /// Add to a pool for points
    ProvideLiquidity(ProvideLiquidityArgs),
    /// Redeem points for reserves
    RemoveLiquidity(RemoveLiquidityArgs),
    /// Buy base with quote
    Buy(SwapArgs),
    /// Sell base for quote
    Sell(SwapArgs),
}

impl Transition {
    /// Method tag of this step
    pub fn method(&self) -> MethodKind {
        match self {
            Self::Genesis => MethodKind::Genesis,
            Self::Deposit(_) => MethodKind::Deposit,
            Self::Burn(_) => MethodKind::Burn,
            Self::CreatePool(_) => MethodKind::CreatePool,
            Self::ProvideLiquidity(_) => MethodKind::ProvideLiquidity,
            Self::RemoveLiquidity(_) => MethodKind::RemoveLiquidity,
            Self::Buy(_) => MethodKind::Buy,
            Self::Sell(_) => MethodKind::Sell,
        }
    }

    /// Run every check and compute the new roots with the leaves written.
    pub fn execute(
        &self,
        ctx: &Context<'_>,
        roots: &StateRoots,
        earlier: Option<&Proof>,
    ) -> Result<Outcome> {
        if !matches!(self, Self::Genesis) {
            anchor(ctx, roots, earlier)?;
        }

        match self {
            Self::Genesis => Ok(Outcome {
                roots: *roots,
                writes: Vec::new(),
            }),
            Self::Deposit(args) => deposit::execute(roots, args),
            Self::Burn(args) => burn::execute(ctx, roots, args),
            Self::CreatePool(args) => create_pool::execute(ctx, roots, args),
            Self::ProvideLiquidity(args) => liquidity::provide(ctx, roots, args),
            Self::RemoveLiquidity(args) => liquidity::remove(ctx, roots, args),
            Self::Buy(args) => swap::buy(ctx, roots, args),
            Self::Sell(args) => swap::sell(ctx, roots, args),
        }
    }

    /// Like [`Transition::execute`], returning only the new roots.
    pub fn apply(
        &self,
        ctx: &Context<'_>,
        roots: &StateRoots,
        earlier: Option<&Proof>,
    ) -> Result<StateRoots> {
        self.execute(ctx, roots, earlier).map(|outcome| outcome.roots)
    }
}

/// The earlier proof must end where this step starts and must verify.
fn anchor(ctx: &Context<'_>, roots: &StateRoots, earlier: Option<&Proof>) -> Result<()> {
    let earlier = earlier.ok_or(TransitionError::ChainMismatch)?;
    if earlier.public_output != *roots {
        return Err(TransitionError::ChainMismatch);
    }
    if !ctx.proofs.verify(earlier) {
        return Err(TransitionError::ProofInvalid);
    }
    Ok(())
}

fn check_signature(
    ctx: &Context<'_>,
    signer: &Address,
    message: &[Field],
    signature: &Signature,
) -> Result<()> {
    if !ctx.signatures.verify(signer, message, signature) {
        return Err(TransitionError::SignatureInvalid);
    }
    Ok(())
}

fn check_root(expected: &Field, computed: Field, tree: StateTree) -> Result<()> {
    if *expected != computed {
        return Err(TransitionError::StateMismatch(tree));
    }
    Ok(())
}

/// Shape check for a single witness, returning its leaf index.
fn single_index(witness: &SingleWitness, height: usize) -> Result<u64> {
    witness.check_height(height)?;
    Ok(witness.calculate_index())
}

/// Shape check for a double witness, returning both leaf indexes.
fn double_indexes(witness: &DoubleWitness, height: usize) -> Result<(u64, u64)> {
    witness.check_height(height)?;
    let (index_x1, index_x2) = witness.calculate_indexes();
    if index_x1 == index_x2 {
        return Err(TransitionError::IndexMismatch);
    }
    Ok((index_x1, index_x2))
}

/// Leaf hash of a balance that may not exist yet.
fn balance_leaf(owner: &Address, token: &TokenId, amount: Option<Amount>) -> Field {
    amount.map_or(tidepool_merkle::EMPTY_LEAF, |amount| {
        Balance::new(*owner, *token, amount).hash()
    })
}

#[cfg(test)]
pub(crate) mod fixtures;
