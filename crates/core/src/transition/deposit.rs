//! Replaying a bridge deposit into the balances tree

use serde::{Deserialize, Serialize};
use tidepool_merkle::{SingleWitness, BALANCES_HEIGHT};

use super::{balance_leaf, check_root, single_index, LeafValue, LeafWrite, Outcome};
use crate::{
    dex::credit,
    error::{Result, StateTree},
    leaves::{next_deposit_head, Balance, Deposit, Leaf},
    state::StateRoots,
    types::{Amount, Field},
};

/// Arguments of a deposit replay
///
/// `current_deposit_head` and `expected_deposit_head` are the bridge hash
/// chain before and after this deposit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositArgs {
    /// Path to the depositor's balance
    pub witness: SingleWitness,
    /// Record being replayed
    pub deposit: Deposit,
    /// `None` for the depositor's first deposit of this token
    pub prior_balance: Option<Amount>,
    /// Chain head before the deposit
    pub current_deposit_head: Field,
    /// Chain head after the deposit
    pub expected_deposit_head: Field,
}

pub(super) fn execute(roots: &StateRoots, args: &DepositArgs) -> Result<Outcome> {
    let index = single_index(&args.witness, BALANCES_HEIGHT)?;
    let Deposit {
        depositor,
        token,
        amount,
    } = args.deposit;

    let prior = balance_leaf(&depositor, &token, args.prior_balance);
    check_root(&roots.balances, args.witness.calculate_root(&prior), StateTree::Balances)?;
    check_root(
        &args.expected_deposit_head,
        next_deposit_head(&args.current_deposit_head, &args.deposit),
        StateTree::Deposits,
    )?;

    let balance = Balance::new(depositor, token, credit(args.prior_balance, amount)?);

    Ok(Outcome {
        roots: StateRoots {
            balances: args.witness.calculate_root(&balance.hash()),
            ..*roots
        },
        writes: vec![LeafWrite {
            index,
            leaf: LeafValue::Balance(balance),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::TransitionError,
        transition::{fixtures::World, Transition},
        types::token_id,
    };
    use tidepool_merkle::{MerkleTree, EMPTY_LEAF};

    fn deposit_args(world: &World, index: u64, deposit: Deposit, prior: Option<Amount>, head: Field) -> DepositArgs {
        DepositArgs {
            witness: world.balances.single_witness(index).unwrap(),
            deposit,
            prior_balance: prior,
            current_deposit_head: head,
            expected_deposit_head: next_deposit_head(&head, &deposit),
        }
    }

    #[test]
    fn test_first_deposit_creates_single_leaf() {
        let mut world = World::new();
        let (alice, _) = world.user(1);
        let deposit = Deposit::new(alice, token_id("MINA"), 10_000_000);
        let args = deposit_args(&world, 0, deposit, None, EMPTY_LEAF);

        let outcome = world.run(&Transition::Deposit(args)).unwrap();

        let mut expected = MerkleTree::new(BALANCES_HEIGHT).unwrap();
        expected
            .set_leaf(0, Balance::new(alice, token_id("MINA"), 10_000_000).hash())
            .unwrap();
        assert_eq!(outcome.roots.balances, expected.root());
        assert_eq!(outcome.roots.pools, StateRoots::empty().pools);
    }

    #[test]
    fn test_second_deposit_leaves_first_path_unaffected() {
        let mut world = World::new();
        let (alice, _) = world.user(1);
        let first = Deposit::new(alice, token_id("MINA"), 10_000_000);
        let args = deposit_args(&world, 0, first, None, EMPTY_LEAF);
        let head = args.expected_deposit_head;
        world.run(&Transition::Deposit(args)).unwrap();

        let leaf = world.balances.leaf(0);
        let second = Deposit::new(alice, token_id("USDC"), 100_000_000);
        let args = deposit_args(&world, 1, second, None, head);
        world.run(&Transition::Deposit(args)).unwrap();

        assert_eq!(world.balances.leaf(0), leaf);
        let witness = world.balances.single_witness(0).unwrap();
        assert_eq!(witness.calculate_root(&leaf), world.balances.root());
    }

    #[test]
    fn test_deposit_adds_to_existing_balance() {
        let mut world = World::new();
        let (alice, _) = world.user(1);
        world.set_balance(4, alice, token_id("MINA"), 5);
        let deposit = Deposit::new(alice, token_id("MINA"), 7);
        let args = deposit_args(&world, 4, deposit, Some(5), EMPTY_LEAF);

        let outcome = world.run(&Transition::Deposit(args)).unwrap();
        assert_eq!(
            outcome.writes[0].leaf,
            LeafValue::Balance(Balance::new(alice, token_id("MINA"), 12))
        );
    }

    #[test]
    fn test_first_deposit_flag_on_written_leaf_rejected() {
        let mut world = World::new();
        let (alice, _) = world.user(1);
        world.set_balance(4, alice, token_id("MINA"), 5);
        let deposit = Deposit::new(alice, token_id("MINA"), 7);
        let args = deposit_args(&world, 4, deposit, None, EMPTY_LEAF);

        assert_eq!(
            world.run(&Transition::Deposit(args)),
            Err(TransitionError::StateMismatch(StateTree::Balances))
        );
    }

    #[test]
    fn test_wrong_deposit_head_rejected() {
        let mut world = World::new();
        let (alice, _) = world.user(1);
        let deposit = Deposit::new(alice, token_id("MINA"), 7);
        let mut args = deposit_args(&world, 0, deposit, None, EMPTY_LEAF);
        args.expected_deposit_head = [1u8; 32];

        assert_eq!(
            world.run(&Transition::Deposit(args)),
            Err(TransitionError::StateMismatch(StateTree::Deposits))
        );
    }

    #[test]
    fn test_deposit_overflow() {
        let mut world = World::new();
        let (alice, _) = world.user(1);
        world.set_balance(2, alice, token_id("MINA"), u64::MAX);
        let deposit = Deposit::new(alice, token_id("MINA"), 1);
        let args = deposit_args(&world, 2, deposit, Some(u64::MAX), EMPTY_LEAF);

        assert_eq!(world.run(&Transition::Deposit(args)), Err(TransitionError::Overflow));
    }
}
