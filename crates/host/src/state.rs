//! Rollup state database
//!
//! Full copies of the state trees together with the leaf records behind
//! them, so witnesses and prior values can be produced for any account.

use std::{collections::HashMap, hash::Hash};

use thiserror::Error;
use tidepool_core::{
    leaf_or_empty, Address, Amount, Balance, Burn, Field, Leaf, LeafValue, LeafWrite, Liquidity,
    Outcome, Points, Pool, StateRoots, StateTree, TokenId, Withdrawal,
};
use tidepool_merkle::{
    DoubleWitness, MerkleTree, SingleWitness, WitnessError, BALANCES_HEIGHT, BURNS_HEIGHT,
    EMPTY_LEAF, LIQUIDITIES_HEIGHT, POOLS_HEIGHT, WITHDRAWALS_HEIGHT,
};
use tracing::debug;

/// Errors raised while updating the state database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Tree rejected an index or witness request
    #[error(transparent)]
    Witness(#[from] WitnessError),

    /// Every leaf index is taken
    #[error("{0} tree has no free leaf")]
    Full(StateTree),

    /// A write landed on a slot owned by another key
    #[error("{tree} leaf {index} is assigned to another key")]
    SlotConflict {
        /// Tree written
        tree: StateTree,
        /// Leaf index written
        index: u64,
    },

    /// Replayed writes do not reproduce the proven roots
    #[error("replayed roots {actual} differ from proven roots {expected}")]
    Diverged {
        /// Roots the proof ends at
        expected: String,
        /// Roots after replaying the writes
        actual: String,
    },
}

/// One tree with its leaf records and the key each leaf index belongs to.
#[derive(Clone, Debug)]
pub(crate) struct Table<K, L> {
    kind: StateTree,
    tree: MerkleTree,
    slots: HashMap<K, u64>,
    keys: HashMap<u64, K>,
    leaves: HashMap<u64, L>,
    next: u64,
}

impl<K, L> Table<K, L>
where
    K: Copy + Eq + Hash,
    L: Leaf + Copy,
{
    fn new(kind: StateTree, height: usize) -> Result<Self, StateError> {
        Ok(Self {
            kind,
            tree: MerkleTree::new(height)?,
            slots: HashMap::new(),
            keys: HashMap::new(),
            leaves: HashMap::new(),
            next: 0,
        })
    }

    pub(crate) fn root(&self) -> Field {
        self.tree.root()
    }

    /// Leaf index of `key`, if one was assigned.
    pub(crate) fn find(&self, key: &K) -> Option<u64> {
        self.slots.get(key).copied()
    }

    /// Leaf index of `key`, assigning the next free one on first use.
    pub(crate) fn index(&mut self, key: K) -> Result<u64, StateError> {
        if let Some(index) = self.find(&key) {
            return Ok(index);
        }
        while self.keys.contains_key(&self.next) {
            self.next += 1;
        }
        if self.next >= self.tree.capacity() {
            return Err(StateError::Full(self.kind));
        }
        let index = self.next;
        self.slots.insert(key, index);
        self.keys.insert(index, key);
        self.next += 1;
        Ok(index)
    }

    /// Bind `key` to `index`, failing if either is bound elsewhere.
    fn claim(&mut self, key: K, index: u64) -> Result<(), StateError> {
        let conflict = StateError::SlotConflict {
            tree: self.kind,
            index,
        };
        match self.find(&key) {
            Some(bound) if bound == index => return Ok(()),
            Some(_) => return Err(conflict),
            None if self.keys.contains_key(&index) => return Err(conflict),
            None => {}
        }
        if index >= self.tree.capacity() {
            return Err(StateError::Full(self.kind));
        }
        self.slots.insert(key, index);
        self.keys.insert(index, key);
        Ok(())
    }

    pub(crate) fn get(&self, key: &K) -> Option<L> {
        self.find(key).and_then(|index| self.leaves.get(&index).copied())
    }

    /// Store `leaf` under `key`, returning the record it replaced.
    pub(crate) fn write(&mut self, key: K, index: u64, leaf: L) -> Result<Option<L>, StateError> {
        self.claim(key, index)?;
        self.tree.set_leaf(index, leaf.hash())?;
        Ok(self.leaves.insert(index, leaf))
    }

    fn restore(&mut self, index: u64, prior: Option<L>) -> Result<(), StateError> {
        self.tree.set_leaf(index, leaf_or_empty(prior.as_ref()))?;
        match prior {
            Some(leaf) => self.leaves.insert(index, leaf),
            None => self.leaves.remove(&index),
        };
        Ok(())
    }

    pub(crate) fn witness(&self, index: u64) -> Result<SingleWitness, StateError> {
        Ok(self.tree.single_witness(index)?)
    }

    pub(crate) fn double_witness(&self, first: u64, second: u64) -> Result<DoubleWitness, StateError> {
        Ok(self.tree.double_witness(first, second)?)
    }
}

/// Record replaced by a leaf write, kept to undo a diverged commit
#[derive(Debug)]
enum Prior {
    Balance(u64, Option<Balance>),
    Burn(u64, Option<Burn>),
    Pool(u64, Option<Pool>),
    Liquidity(u64, Option<Liquidity>),
}

/// State database
#[derive(Clone, Debug)]
pub struct RollupState {
    pub(crate) balances: Table<(Address, TokenId), Balance>,
    pub(crate) liquidities: Table<(Address, TokenId, TokenId), Liquidity>,
    pub(crate) pools: Table<(TokenId, TokenId), Pool>,
    pub(crate) burns: Table<(Address, TokenId), Burn>,
    /// Index-aligned with `burns`
    pub(crate) withdrawals: Table<(Address, TokenId), Withdrawal>,
    /// Head of the bridge deposit chain replayed so far
    deposit_head: Field,
    /// Number of bridge deposits replayed so far
    deposits_consumed: usize,
}

impl RollupState {
    /// Create a new empty state
    pub fn new() -> Result<Self, StateError> {
        Ok(Self {
            balances: Table::new(StateTree::Balances, BALANCES_HEIGHT)?,
            liquidities: Table::new(StateTree::Liquidities, LIQUIDITIES_HEIGHT)?,
            pools: Table::new(StateTree::Pools, POOLS_HEIGHT)?,
            burns: Table::new(StateTree::Burns, BURNS_HEIGHT)?,
            withdrawals: Table::new(StateTree::Withdrawals, WITHDRAWALS_HEIGHT)?,
            deposit_head: EMPTY_LEAF,
            deposits_consumed: 0,
        })
    }

    /// Current roots of the four state trees
    pub fn roots(&self) -> StateRoots {
        StateRoots {
            balances: self.balances.root(),
            liquidities: self.liquidities.root(),
            pools: self.pools.root(),
            burns: self.burns.root(),
        }
    }

    /// Root of the withdrawals tree, kept index-aligned with burns
    pub fn withdrawals_root(&self) -> Field {
        self.withdrawals.root()
    }

    /// Head of the deposit chain after the last replayed deposit
    pub fn deposit_head(&self) -> Field {
        self.deposit_head
    }

    /// How many bridge deposits have been replayed
    pub fn deposits_consumed(&self) -> usize {
        self.deposits_consumed
    }

    /// Mark one more deposit as replayed, ending at `head`.
    pub fn consume_deposit(&mut self, head: Field) {
        self.deposit_head = head;
        self.deposits_consumed += 1;
    }

    /// Get balance, `None` if never credited
    pub fn balance(&self, owner: &Address, token: &TokenId) -> Option<Amount> {
        self.balances.get(&(*owner, *token)).map(|leaf| leaf.amount)
    }

    /// Pool for the pair, if created
    pub fn pool(&self, base: &TokenId, quote: &TokenId) -> Option<Pool> {
        self.pools.get(&(*base, *quote))
    }

    /// Get liquidity points of `provider` in the pool
    pub fn liquidity(&self, provider: &Address, base: &TokenId, quote: &TokenId) -> Option<Points> {
        self.liquidities
            .get(&(*provider, *base, *quote))
            .map(|leaf| leaf.points)
    }

    /// Cumulative amount burned
    pub fn burned(&self, owner: &Address, token: &TokenId) -> Option<Amount> {
        self.burns.get(&(*owner, *token)).map(|leaf| leaf.amount)
    }

    /// Cumulative amount paid out by the bridge
    pub fn withdrawn(&self, owner: &Address, token: &TokenId) -> Option<Amount> {
        self.withdrawals.get(&(*owner, *token)).map(|leaf| leaf.amount)
    }

    /// Replay the leaf writes of a proven step.
    ///
    /// The resulting roots must equal `outcome.roots`; otherwise every write
    /// is undone and [`StateError::Diverged`] is returned.
    pub fn commit(&mut self, outcome: &Outcome) -> Result<(), StateError> {
        let mut undo = Vec::with_capacity(outcome.writes.len());
        for write in &outcome.writes {
            match self.write(write) {
                Ok(prior) => undo.push(prior),
                Err(e) => {
                    self.rollback(undo)?;
                    return Err(e);
                }
            }
        }

        let roots = self.roots();
        if roots != outcome.roots {
            self.rollback(undo)?;
            return Err(StateError::Diverged {
                expected: outcome.roots.short(),
                actual: roots.short(),
            });
        }
        debug!("Committed {} leaf writes, roots {}", outcome.writes.len(), roots.short());
        Ok(())
    }

    /// Mirror the bridge's withdrawal leaf update.
    pub fn record_withdrawal(
        &mut self,
        owner: &Address,
        token: &TokenId,
        total: Amount,
    ) -> Result<(), StateError> {
        let key = (*owner, *token);
        let index = self.burns.index(key)?;
        self.withdrawals
            .write(key, index, Withdrawal::new(*owner, *token, total))?;
        Ok(())
    }

    fn write(&mut self, write: &LeafWrite) -> Result<Prior, StateError> {
        let index = write.index;
        let prior = match write.leaf {
            LeafValue::Balance(leaf) => {
                Prior::Balance(index, self.balances.write((leaf.owner, leaf.token), index, leaf)?)
            }
            LeafValue::Burn(leaf) => {
                Prior::Burn(index, self.burns.write((leaf.burner, leaf.token), index, leaf)?)
            }
            LeafValue::Pool(leaf) => {
                Prior::Pool(index, self.pools.write((leaf.base, leaf.quote), index, leaf)?)
            }
            LeafValue::Liquidity(leaf) => Prior::Liquidity(
                index,
                self.liquidities
                    .write((leaf.provider, leaf.base, leaf.quote), index, leaf)?,
            ),
        };
        Ok(prior)
    }

    fn rollback(&mut self, undo: Vec<Prior>) -> Result<(), StateError> {
        for prior in undo.into_iter().rev() {
            match prior {
                Prior::Balance(index, leaf) => self.balances.restore(index, leaf)?,
                Prior::Burn(index, leaf) => self.burns.restore(index, leaf)?,
                Prior::Pool(index, leaf) => self.pools.restore(index, leaf)?,
                Prior::Liquidity(index, leaf) => self.liquidities.restore(index, leaf)?,
            }
        }
        Ok(())
    }
}
