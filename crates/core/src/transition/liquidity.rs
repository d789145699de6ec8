//! Adding and removing pool liquidity

use serde::{Deserialize, Serialize};
use tidepool_merkle::{DoubleWitness, SingleWitness, BALANCES_HEIGHT, LIQUIDITIES_HEIGHT, POOLS_HEIGHT};

use super::{
    balance_leaf, check_root, check_signature, double_indexes, single_index, Context, LeafValue,
    LeafWrite, Outcome,
};
use crate::{
    dex::{credit, debit, provide_amounts, remove_amounts},
    error::{Result, StateTree, TransitionError},
    leaves::{leaf_or_empty, Balance, Leaf, Liquidity, Pool},
    signature::Signature,
    state::StateRoots,
    types::{field_from_u128, field_from_u64, Address, Amount, Field, Points, TokenId},
};

/// Arguments of a liquidity provision, signed over
/// `(base, quote, base_in, quote_limit)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvideLiquidityArgs {
    /// Path to the pool
    pub pool_witness: SingleWitness,
    /// Path to the provider's points
    pub liquidity_witness: SingleWitness,
    /// Base balance first, quote balance second
    pub balance_witness: DoubleWitness,
    /// Liquidity provider
    pub provider: Address,
    /// Pool before the change
    pub pool: Pool,
    /// `None` for a first-time provider
    pub prior_points: Option<Points>,
    /// Base balance before
    pub base_balance: Option<Amount>,
    /// Quote balance before
    pub quote_balance: Option<Amount>,
    /// Base added
    pub base_in: Amount,
    /// Most quote the provider will add
    pub quote_limit: Amount,
    /// Provider's signature over the message
    pub signature: Signature,
}

impl ProvideLiquidityArgs {
    /// Fields the provider signs
    pub fn message(base: &TokenId, quote: &TokenId, base_in: Amount, quote_limit: Amount) -> Vec<Field> {
        vec![*base, *quote, field_from_u64(base_in), field_from_u64(quote_limit)]
    }
}

/// Arguments of a liquidity removal, signed over
/// `(base, quote, base_limit, quote_limit, points)`
///
/// The received base must be at least `base_limit` while the received quote
/// must be at most `quote_limit`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityArgs {
    /// Path to the pool
    pub pool_witness: SingleWitness,
    /// Path to the provider's points
    pub liquidity_witness: SingleWitness,
    /// Base balance first, quote balance second
    pub balance_witness: DoubleWitness,
    /// Liquidity provider
    pub provider: Address,
    /// Pool before the change
    pub pool: Pool,
    /// Points held before
    pub prior_points: Option<Points>,
    /// Base balance before
    pub base_balance: Option<Amount>,
    /// Quote balance before
    pub quote_balance: Option<Amount>,
    /// Points redeemed
    pub points: Points,
    /// Least base to receive
    pub base_limit: Amount,
    /// Most quote to receive
    pub quote_limit: Amount,
    /// Provider's signature over the message
    pub signature: Signature,
}

impl RemoveLiquidityArgs {
    /// Fields the provider signs
    pub fn message(
        base: &TokenId,
        quote: &TokenId,
        base_limit: Amount,
        quote_limit: Amount,
        points: Points,
    ) -> Vec<Field> {
        vec![
            *base,
            *quote,
            field_from_u64(base_limit),
            field_from_u64(quote_limit),
            field_from_u128(points),
        ]
    }
}

/// Witness fields shared by provision and removal
struct Positions<'a> {
    pool_witness: &'a SingleWitness,
    liquidity_witness: &'a SingleWitness,
    balance_witness: &'a DoubleWitness,
    provider: &'a Address,
    pool: &'a Pool,
    prior_points: Option<Points>,
    base_balance: Option<Amount>,
    quote_balance: Option<Amount>,
}

impl Positions<'_> {
    fn indexes(&self) -> Result<[u64; 4]> {
        let pool = single_index(self.pool_witness, POOLS_HEIGHT)?;
        let liquidity = single_index(self.liquidity_witness, LIQUIDITIES_HEIGHT)?;
        let (base, quote) = double_indexes(self.balance_witness, BALANCES_HEIGHT)?;
        Ok([pool, liquidity, base, quote])
    }

    fn check_roots(&self, roots: &StateRoots) -> Result<()> {
        let liquidity = self.prior_points.map(|points| Liquidity {
            provider: *self.provider,
            base: self.pool.base,
            quote: self.pool.quote,
            points,
        });
        check_root(
            &roots.pools,
            self.pool_witness.calculate_root(&self.pool.hash()),
            StateTree::Pools,
        )?;
        check_root(
            &roots.liquidities,
            self.liquidity_witness.calculate_root(&leaf_or_empty(liquidity.as_ref())),
            StateTree::Liquidities,
        )?;
        check_root(
            &roots.balances,
            self.balance_witness.calculate_root(
                &balance_leaf(self.provider, &self.pool.base, self.base_balance),
                &balance_leaf(self.provider, &self.pool.quote, self.quote_balance),
            ),
            StateTree::Balances,
        )
    }

    fn finish(
        &self,
        roots: &StateRoots,
        [pool_index, liquidity_index, base_index, quote_index]: [u64; 4],
        pool: Pool,
        points: Points,
        base_amount: Amount,
        quote_amount: Amount,
    ) -> Outcome {
        let liquidity = Liquidity {
            provider: *self.provider,
            base: pool.base,
            quote: pool.quote,
            points,
        };
        let base_balance = Balance::new(*self.provider, pool.base, base_amount);
        let quote_balance = Balance::new(*self.provider, pool.quote, quote_amount);

        Outcome {
            roots: StateRoots {
                balances: self
                    .balance_witness
                    .calculate_root(&base_balance.hash(), &quote_balance.hash()),
                liquidities: self.liquidity_witness.calculate_root(&liquidity.hash()),
                pools: self.pool_witness.calculate_root(&pool.hash()),
                burns: roots.burns,
            },
            writes: vec![
                LeafWrite {
                    index: pool_index,
                    leaf: LeafValue::Pool(pool),
                },
                LeafWrite {
                    index: liquidity_index,
                    leaf: LeafValue::Liquidity(liquidity),
                },
                LeafWrite {
                    index: base_index,
                    leaf: LeafValue::Balance(base_balance),
                },
                LeafWrite {
                    index: quote_index,
                    leaf: LeafValue::Balance(quote_balance),
                },
            ],
        }
    }
}

pub(super) fn provide(ctx: &Context<'_>, roots: &StateRoots, args: &ProvideLiquidityArgs) -> Result<Outcome> {
    let positions = Positions {
        pool_witness: &args.pool_witness,
        liquidity_witness: &args.liquidity_witness,
        balance_witness: &args.balance_witness,
        provider: &args.provider,
        pool: &args.pool,
        prior_points: args.prior_points,
        base_balance: args.base_balance,
        quote_balance: args.quote_balance,
    };
    let indexes = positions.indexes()?;

    check_signature(
        ctx,
        &args.provider,
        &ProvideLiquidityArgs::message(&args.pool.base, &args.pool.quote, args.base_in, args.quote_limit),
        &args.signature,
    )?;
    positions.check_roots(roots)?;

    let (quote_in, minted) = provide_amounts(&args.pool, args.base_in)?;
    if quote_in > args.quote_limit {
        return Err(TransitionError::SlippageExceeded {
            limit: args.quote_limit,
            actual: quote_in,
        });
    }

    let base_amount = debit(args.base_balance, args.base_in)?;
    let quote_amount = debit(args.quote_balance, quote_in)?;
    let points = args
        .prior_points
        .unwrap_or(0)
        .checked_add(minted)
        .ok_or(TransitionError::Overflow)?;
    let pool = Pool {
        base_amount: credit(Some(args.pool.base_amount), args.base_in)?,
        quote_amount: credit(Some(args.pool.quote_amount), quote_in)?,
        total_points: args
            .pool
            .total_points
            .checked_add(minted)
            .ok_or(TransitionError::Overflow)?,
        ..args.pool
    };

    Ok(positions.finish(roots, indexes, pool, points, base_amount, quote_amount))
}

pub(super) fn remove(ctx: &Context<'_>, roots: &StateRoots, args: &RemoveLiquidityArgs) -> Result<Outcome> {
    let positions = Positions {
        pool_witness: &args.pool_witness,
        liquidity_witness: &args.liquidity_witness,
        balance_witness: &args.balance_witness,
        provider: &args.provider,
        pool: &args.pool,
        prior_points: args.prior_points,
        base_balance: args.base_balance,
        quote_balance: args.quote_balance,
    };
    let indexes = positions.indexes()?;

    check_signature(
        ctx,
        &args.provider,
        &RemoveLiquidityArgs::message(
            &args.pool.base,
            &args.pool.quote,
            args.base_limit,
            args.quote_limit,
            args.points,
        ),
        &args.signature,
    )?;
    positions.check_roots(roots)?;

    let (base_out, quote_out) = remove_amounts(&args.pool, args.points)?;
    let points = args
        .prior_points
        .unwrap_or(0)
        .checked_sub(args.points)
        .ok_or(TransitionError::Underflow)?;

    if base_out < args.base_limit {
        return Err(TransitionError::SlippageExceeded {
            limit: args.base_limit,
            actual: base_out,
        });
    }
    if quote_out > args.quote_limit {
        return Err(TransitionError::SlippageExceeded {
            limit: args.quote_limit,
            actual: quote_out,
        });
    }

    let pool = Pool {
        base_amount: debit(Some(args.pool.base_amount), base_out)?,
        quote_amount: debit(Some(args.pool.quote_amount), quote_out)?,
        total_points: args
            .pool
            .total_points
            .checked_sub(args.points)
            .ok_or(TransitionError::Underflow)?,
        ..args.pool
    };
    let base_amount = credit(args.base_balance, base_out)?;
    let quote_amount = credit(args.quote_balance, quote_out)?;

    Ok(positions.finish(roots, indexes, pool, points, base_amount, quote_amount))
}
