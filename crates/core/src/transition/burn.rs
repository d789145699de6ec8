//! Burning tokens ahead of a bridge withdrawal

use serde::{Deserialize, Serialize};
use tidepool_merkle::{SingleWitness, BALANCES_HEIGHT, BURNS_HEIGHT};

use super::{balance_leaf, check_root, check_signature, single_index, Context, LeafValue, LeafWrite, Outcome};
use crate::{
    dex::{credit, debit},
    error::{Result, StateTree},
    leaves::{leaf_or_empty, Balance, Burn, Leaf},
    signature::Signature,
    state::StateRoots,
    types::{field_from_u64, Address, Amount, Field, TokenId},
};

/// Arguments of a burn, signed over `(token, amount)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnArgs {
    /// Path to the owner's balance
    pub balance_witness: SingleWitness,
    /// Path to the owner's burn total
    pub burn_witness: SingleWitness,
    /// Account burning
    pub owner: Address,
    /// Token burned
    pub token: TokenId,
    /// Amount burned
    pub amount: Amount,
    /// Balance before the burn
    pub prior_balance: Option<Amount>,
    /// Cumulative amount burned so far, `None` before the first burn
    pub prior_burned: Option<Amount>,
    /// Owner's signature over [`BurnArgs::message`]
    pub signature: Signature,
}

impl BurnArgs {
    /// Fields the owner signs
    pub fn message(token: &TokenId, amount: Amount) -> Vec<Field> {
        vec![*token, field_from_u64(amount)]
    }
}

pub(super) fn execute(ctx: &Context<'_>, roots: &StateRoots, args: &BurnArgs) -> Result<Outcome> {
    let balance_index = single_index(&args.balance_witness, BALANCES_HEIGHT)?;
    let burn_index = single_index(&args.burn_witness, BURNS_HEIGHT)?;

    check_signature(
        ctx,
        &args.owner,
        &BurnArgs::message(&args.token, args.amount),
        &args.signature,
    )?;

    let prior_burn = args
        .prior_burned
        .map(|amount| Burn::new(args.owner, args.token, amount));
    check_root(
        &roots.balances,
        args.balance_witness
            .calculate_root(&balance_leaf(&args.owner, &args.token, args.prior_balance)),
        StateTree::Balances,
    )?;
    check_root(
        &roots.burns,
        args.burn_witness.calculate_root(&leaf_or_empty(prior_burn.as_ref())),
        StateTree::Burns,
    )?;

    let balance = Balance::new(args.owner, args.token, debit(args.prior_balance, args.amount)?);
    let burn = Burn::new(args.owner, args.token, credit(args.prior_burned, args.amount)?);

    Ok(Outcome {
        roots: StateRoots {
            balances: args.balance_witness.calculate_root(&balance.hash()),
            burns: args.burn_witness.calculate_root(&burn.hash()),
            ..*roots
        },
        writes: vec![
            LeafWrite {
                index: balance_index,
                leaf: LeafValue::Balance(balance),
            },
            LeafWrite {
                index: burn_index,
                leaf: LeafValue::Burn(burn),
            },
        ],
    })
}
