//! Constant-product swaps

use serde::{Deserialize, Serialize};
use tidepool_merkle::{DoubleWitness, SingleWitness, BALANCES_HEIGHT, POOLS_HEIGHT};

use super::{
    balance_leaf, check_root, check_signature, double_indexes, single_index, Context, LeafValue,
    LeafWrite, Outcome,
};
use crate::{
    dex::{buy_cost, credit, debit, sell_cost},
    error::{Result, StateTree, TransitionError},
    leaves::{Balance, Leaf, Pool},
    signature::Signature,
    state::StateRoots,
    types::{field_from_u64, Address, Amount, Field, TokenId},
};

/// Arguments of a buy or a sell, signed over `(base, quote, amount, limit)`
///
/// A buy receives `amount` base and pays at most `limit` quote. A sell
/// receives `amount` quote and pays at most `limit` base. The paid leg
/// includes the pool fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapArgs {
    /// Path to the pool
    pub pool_witness: SingleWitness,
    /// Base balance first, quote balance second
    pub balance_witness: DoubleWitness,
    /// Account trading
    pub trader: Address,
    /// Pool before the trade
    pub pool: Pool,
    /// Base balance before
    pub base_balance: Option<Amount>,
    /// Quote balance before
    pub quote_balance: Option<Amount>,
    /// Amount received
    pub amount: Amount,
    /// Most the trader will pay
    pub limit: Amount,
    /// Trader's signature over [`SwapArgs::message`]
    pub signature: Signature,
}

impl SwapArgs {
    /// Fields the trader signs
    pub fn message(base: &TokenId, quote: &TokenId, amount: Amount, limit: Amount) -> Vec<Field> {
        vec![*base, *quote, field_from_u64(amount), field_from_u64(limit)]
    }
}

/// Checks common to both directions, returning the pool and balance indexes.
fn prepare(ctx: &Context<'_>, roots: &StateRoots, args: &SwapArgs) -> Result<(u64, u64, u64)> {
    let pool_index = single_index(&args.pool_witness, POOLS_HEIGHT)?;
    let (base_index, quote_index) = double_indexes(&args.balance_witness, BALANCES_HEIGHT)?;

    check_signature(
        ctx,
        &args.trader,
        &SwapArgs::message(&args.pool.base, &args.pool.quote, args.amount, args.limit),
        &args.signature,
    )?;

    check_root(
        &roots.pools,
        args.pool_witness.calculate_root(&args.pool.hash()),
        StateTree::Pools,
    )?;
    check_root(
        &roots.balances,
        args.balance_witness.calculate_root(
            &balance_leaf(&args.trader, &args.pool.base, args.base_balance),
            &balance_leaf(&args.trader, &args.pool.quote, args.quote_balance),
        ),
        StateTree::Balances,
    )?;

    Ok((pool_index, base_index, quote_index))
}

fn check_limit(paid: Amount, limit: Amount) -> Result<()> {
    if paid > limit {
        return Err(TransitionError::SlippageExceeded {
            limit,
            actual: paid,
        });
    }
    Ok(())
}

fn settle(
    roots: &StateRoots,
    args: &SwapArgs,
    (pool_index, base_index, quote_index): (u64, u64, u64),
    pool: Pool,
    base_amount: Amount,
    quote_amount: Amount,
) -> Outcome {
    let base_balance = Balance::new(args.trader, pool.base, base_amount);
    let quote_balance = Balance::new(args.trader, pool.quote, quote_amount);

    Outcome {
        roots: StateRoots {
            balances: args
                .balance_witness
                .calculate_root(&base_balance.hash(), &quote_balance.hash()),
            pools: args.pool_witness.calculate_root(&pool.hash()),
            ..*roots
        },
        writes: vec![
            LeafWrite {
                index: pool_index,
                leaf: LeafValue::Pool(pool),
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

pub(super) fn buy(ctx: &Context<'_>, roots: &StateRoots, args: &SwapArgs) -> Result<Outcome> {
    let indexes = prepare(ctx, roots, args)?;

    let paid = buy_cost(args.pool.base_amount, args.pool.quote_amount, args.amount)?;
    check_limit(paid, args.limit)?;

    let base_amount = credit(args.base_balance, args.amount)?;
    let quote_amount = debit(args.quote_balance, paid)?;
    let pool = Pool {
        base_amount: debit(Some(args.pool.base_amount), args.amount)?,
        quote_amount: credit(Some(args.pool.quote_amount), paid)?,
        ..args.pool
    };

    Ok(settle(roots, args, indexes, pool, base_amount, quote_amount))
}

pub(super) fn sell(ctx: &Context<'_>, roots: &StateRoots, args: &SwapArgs) -> Result<Outcome> {
    let indexes = prepare(ctx, roots, args)?;

    let paid = sell_cost(args.pool.base_amount, args.pool.quote_amount, args.amount)?;
    check_limit(paid, args.limit)?;

    let base_amount = debit(args.base_balance, paid)?;
    let quote_amount = credit(args.quote_balance, args.amount)?;
    let pool = Pool {
        base_amount: credit(Some(args.pool.base_amount), paid)?,
        quote_amount: debit(Some(args.pool.quote_amount), args.amount)?,
        ..args.pool
    };

    Ok(settle(roots, args, indexes, pool, base_amount, quote_amount))
}
