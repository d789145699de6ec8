//! Opening a new trading pair

use serde::{Deserialize, Serialize};
use tidepool_merkle::{
    DoubleWitness, SingleWitness, BALANCES_HEIGHT, EMPTY_LEAF, LIQUIDITIES_HEIGHT, POOLS_HEIGHT,
};

use super::{
    balance_leaf, check_root, check_signature, double_indexes, single_index, Context, LeafValue,
    LeafWrite, Outcome,
};
use crate::{
    dex::debit,
    error::{Result, StateTree, TransitionError},
    leaves::{Balance, Leaf, Liquidity, Pool},
    signature::Signature,
    state::StateRoots,
    types::{field_from_u64, Address, Amount, Field, TokenId},
};

/// Arguments of a pool creation
///
/// The pool slot and the creator's liquidity slot must both be empty.
/// `balance_witness` covers the base balance first and the quote balance second.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolArgs {
    /// Path to the empty pool slot
    pub pool_witness: SingleWitness,
    /// Path to the empty liquidity slot
    pub liquidity_witness: SingleWitness,
    /// Base and quote balance paths
    pub balance_witness: DoubleWitness,
    /// Creator and first provider
    pub provider: Address,
    /// Base token
    pub base: TokenId,
    /// Quote token
    pub quote: TokenId,
    /// Initial base reserve
    pub base_amount: Amount,
    /// Initial quote reserve
    pub quote_amount: Amount,
    /// Creator's base balance before
    pub base_balance: Option<Amount>,
    /// Creator's quote balance before
    pub quote_balance: Option<Amount>,
    /// Creator's signature over [`CreatePoolArgs::message`]
    pub signature: Signature,
}

impl CreatePoolArgs {
    /// Fields the creator signs
    pub fn message(base: &TokenId, quote: &TokenId, base_amount: Amount, quote_amount: Amount) -> Vec<Field> {
        vec![*base, *quote, field_from_u64(base_amount), field_from_u64(quote_amount)]
    }
}

pub(super) fn execute(ctx: &Context<'_>, roots: &StateRoots, args: &CreatePoolArgs) -> Result<Outcome> {
    let pool_index = single_index(&args.pool_witness, POOLS_HEIGHT)?;
    let liquidity_index = single_index(&args.liquidity_witness, LIQUIDITIES_HEIGHT)?;
    let (base_index, quote_index) = double_indexes(&args.balance_witness, BALANCES_HEIGHT)?;

    check_signature(
        ctx,
        &args.provider,
        &CreatePoolArgs::message(&args.base, &args.quote, args.base_amount, args.quote_amount),
        &args.signature,
    )?;

    check_root(&roots.pools, args.pool_witness.calculate_root(&EMPTY_LEAF), StateTree::Pools)?;
    check_root(
        &roots.liquidities,
        args.liquidity_witness.calculate_root(&EMPTY_LEAF),
        StateTree::Liquidities,
    )?;
    check_root(
        &roots.balances,
        args.balance_witness.calculate_root(
            &balance_leaf(&args.provider, &args.base, args.base_balance),
            &balance_leaf(&args.provider, &args.quote, args.quote_balance),
        ),
        StateTree::Balances,
    )?;

    if args.base_amount == 0 {
        return Err(TransitionError::ZeroAmount("base amount"));
    }
    if args.quote_amount == 0 {
        return Err(TransitionError::ZeroAmount("quote amount"));
    }

    let points = u128::from(args.base_amount) * u128::from(args.quote_amount);
    let pool = Pool {
        base: args.base,
        quote: args.quote,
        base_amount: args.base_amount,
        quote_amount: args.quote_amount,
        total_points: points,
    };
    let liquidity = Liquidity {
        provider: args.provider,
        base: args.base,
        quote: args.quote,
        points,
    };
    let base_balance = Balance::new(args.provider, args.base, debit(args.base_balance, args.base_amount)?);
    let quote_balance = Balance::new(
        args.provider,
        args.quote,
        debit(args.quote_balance, args.quote_amount)?,
    );

    Ok(Outcome {
        roots: StateRoots {
            balances: args
                .balance_witness
                .calculate_root(&base_balance.hash(), &quote_balance.hash()),
            liquidities: args.liquidity_witness.calculate_root(&liquidity.hash()),
            pools: args.pool_witness.calculate_root(&pool.hash()),
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
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        signature::sign_fields,
        transition::{fixtures::World, Transition},
        types::token_id,
    };
    use ed25519_dalek::SigningKey;

    fn create_args(world: &World, key: &SigningKey, provider: Address, base_amount: Amount, quote_amount: Amount) -> CreatePoolArgs {
        let base = token_id("MINA");
        let quote = token_id("USDC");
        CreatePoolArgs {
            pool_witness: world.pools.single_witness(0).unwrap(),
            liquidity_witness: world.liquidities.single_witness(0).unwrap(),
            balance_witness: world.balances.double_witness(0, 1).unwrap(),
            provider,
            base,
            quote,
            base_amount,
            quote_amount,
            base_balance: Some(100_000_000),
            quote_balance: Some(100_000_000),
            signature: sign_fields(
                key,
                &CreatePoolArgs::message(&base, &quote, base_amount, quote_amount),
            ),
        }
    }

    fn funded_world() -> (World, Address, SigningKey) {
        let mut world = World::new();
        let (alice, key) = world.user(1);
        world.set_balance(0, alice, token_id("MINA"), 100_000_000);
        world.set_balance(1, alice, token_id("USDC"), 100_000_000);
        (world, alice, key)
    }

    #[test]
    fn test_create_pool_seeds_points() {
        let (mut world, alice, key) = funded_world();
        let args = create_args(&world, &key, alice, 32_000_000, 50_000_000);
        let outcome = world.run(&Transition::CreatePool(args)).unwrap();

        let LeafValue::Pool(pool) = outcome.writes[0].leaf else {
            panic!("first write is the pool");
        };
        assert_eq!(pool.total_points, 1_600_000_000_000_000);
        assert_eq!(
            outcome.writes[2].leaf,
            LeafValue::Balance(Balance::new(alice, token_id("MINA"), 68_000_000))
        );
        assert_eq!(
            outcome.writes[3].leaf,
            LeafValue::Balance(Balance::new(alice, token_id("USDC"), 50_000_000))
        );
    }

    #[test]
    fn test_second_pool_for_pair_rejected() {
        let (mut world, alice, key) = funded_world();
        let args = create_args(&world, &key, alice, 1_000, 1_000);
        world.run(&Transition::CreatePool(args)).unwrap();

        let mut again = create_args(&world, &key, alice, 1_000, 1_000);
        again.base_balance = Some(99_999_000);
        again.quote_balance = Some(99_999_000);
        assert_eq!(
            world.run(&Transition::CreatePool(again)),
            Err(TransitionError::StateMismatch(StateTree::Pools))
        );
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (mut world, alice, key) = funded_world();
        let args = create_args(&world, &key, alice, 0, 1_000);
        assert_eq!(
            world.run(&Transition::CreatePool(args)),
            Err(TransitionError::ZeroAmount("base amount"))
        );
    }

    #[test]
    fn test_same_balance_slot_twice_rejected() {
        let (mut world, alice, key) = funded_world();
        let mut args = create_args(&world, &key, alice, 1_000, 1_000);
        let single = world.balances.single_witness(0).unwrap();
        args.balance_witness = DoubleWitness::new(
            single.siblings.clone(),
            single.siblings,
            vec![false; BALANCES_HEIGHT - 1],
        );
        assert_eq!(
            world.run(&Transition::CreatePool(args)),
            Err(TransitionError::IndexMismatch)
        );
    }

    #[test]
    fn test_insufficient_quote_balance() {
        let (mut world, alice, key) = funded_world();
        let args = create_args(&world, &key, alice, 1_000, 100_000_001);
        assert_eq!(world.run(&Transition::CreatePool(args)), Err(TransitionError::Underflow));
    }
}
