//! Bridge contract: custody, deposit hash chain and withdrawals
//!
//! Deposits land in two phases. [`BridgeContract::deposit`] takes custody and
//! queues the record; [`BridgeContract::apply_deposits`] later folds the queue
//! into the applied deposit chain, which is the only chain the rollup may
//! replay from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidepool_core::{
    leaf_or_empty, next_deposit_head, Address, Amount, Burn, Deposit, Field, Leaf, StateRoots,
    StateTree, TokenId, Withdrawal,
};
use tidepool_merkle::{
    empty_root, SingleWitness, WitnessError, BURNS_HEIGHT, EMPTY_LEAF, WITHDRAWALS_HEIGHT,
};
use tracing::{info, warn};

/// Reasons the bridge refuses a call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Witness of the wrong height
    #[error("invalid witness: {0}")]
    InvalidWitness(#[from] WitnessError),
    /// Burn and withdrawal witnesses disagree on the leaf index
    #[error("burn and withdrawal witnesses point at different leaves")]
    IndexMismatch,
    /// Claimed withdrawn total above the burned total
    #[error("withdrawn total exceeds burned total")]
    Underflow,
    /// Custody would not fit an amount
    #[error("custody overflow")]
    Overflow,
    /// A root or deposit head did not match
    #[error("{0} root does not match the supplied witness")]
    StateMismatch(StateTree),
    /// Not enough tokens held to pay out
    #[error("custody holds {available}, withdrawal needs {requested}")]
    InsufficientCustody {
        /// Payout asked for
        requested: Amount,
        /// Tokens held
        available: Amount,
    },
    /// The rollup replayed deposits the bridge has not applied
    #[error("rollup consumed {consumed} deposits, bridge applied {applied}")]
    UnappliedDeposits {
        /// Deposits replayed by the rollup
        consumed: usize,
        /// Deposits applied on the bridge
        applied: usize,
    },
}

/// Claim for the tokens burned on the rollup but not yet paid out
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    /// Account that burned and gets paid
    pub withdrawer: Address,
    /// Token being withdrawn
    pub token: TokenId,
    /// Path to the burn leaf in the settled burns tree
    pub burn_witness: SingleWitness,
    /// Path to the same index in the withdrawals tree
    pub withdrawal_witness: SingleWitness,
    /// Cumulative amount already paid out, `None` before the first withdrawal
    pub total_withdrawn: Option<Amount>,
    /// Cumulative amount burned in the settled state
    pub total_burned: Amount,
}

/// Events emitted by the bridge, in call order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEvent {
    /// A deposit was taken into custody and queued
    DepositRecorded {
        /// The queued record
        deposit: Deposit,
        /// Head of the chain over every recorded deposit, applied or not
        head: Field,
    },
    /// Queued deposits were folded into the applied chain
    DepositsApplied {
        /// Deposits applied by this call
        count: usize,
        /// New applied head
        head: Field,
    },
    /// A withdrawal was paid out
    Withdrawn {
        /// Account paid
        withdrawer: Address,
        /// Token paid
        token: TokenId,
        /// Amount paid by this call
        amount: Amount,
        /// Cumulative amount paid after this call
        total: Amount,
    },
}

/// Bridge state: custody, the deposit chains and the withdrawals root
#[derive(Clone, Debug)]
pub struct BridgeContract {
    /// Head over every recorded deposit
    recorded_head: Field,
    /// Recorded but not yet applied
    pending: Vec<Deposit>,
    /// Applied deposits and the head after each
    applied: Vec<Deposit>,
    applied_heads: Vec<Field>,
    withdrawals_root: Field,
    custody: HashMap<TokenId, Amount>,
    events: Vec<BridgeEvent>,
}

impl BridgeContract {
    /// Bridge with no deposits and an empty withdrawals tree
    pub fn new() -> Self {
        Self {
            recorded_head: EMPTY_LEAF,
            pending: Vec::new(),
            applied: Vec::new(),
            applied_heads: Vec::new(),
            withdrawals_root: empty_root(WITHDRAWALS_HEIGHT),
            custody: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Head of the applied deposit chain
    pub fn deposit_head(&self) -> Field {
        self.head_at(self.applied.len()).unwrap_or(EMPTY_LEAF)
    }

    /// Head over every recorded deposit, including the pending ones
    pub fn recorded_head(&self) -> Field {
        self.recorded_head
    }

    /// Head of the applied chain after its first `count` deposits
    pub fn head_at(&self, count: usize) -> Option<Field> {
        match count {
            0 => Some(EMPTY_LEAF),
            n => self.applied_heads.get(n - 1).copied(),
        }
    }

    /// Deposits waiting for [`Self::apply_deposits`]
    pub fn pending_deposits(&self) -> &[Deposit] {
        &self.pending
    }

    /// Deposits the rollup may replay, oldest first
    pub fn applied_deposits(&self) -> &[Deposit] {
        &self.applied
    }

    /// Root of the withdrawals tree
    pub fn withdrawals_root(&self) -> Field {
        self.withdrawals_root
    }

    /// Tokens held for `token`
    pub fn custody(&self, token: &TokenId) -> Amount {
        self.custody.get(token).copied().unwrap_or(0)
    }

    /// Every event emitted so far
    pub fn events(&self) -> &[BridgeEvent] {
        &self.events
    }

    /// Take custody of a deposit and queue it for the applied chain.
    pub fn deposit(
        &mut self,
        depositor: Address,
        token: TokenId,
        amount: Amount,
    ) -> Result<BridgeEvent, BridgeError> {
        let held = self
            .custody(&token)
            .checked_add(amount)
            .ok_or(BridgeError::Overflow)?;
        let deposit = Deposit::new(depositor, token, amount);

        self.custody.insert(token, held);
        self.recorded_head = next_deposit_head(&self.recorded_head, &deposit);
        self.pending.push(deposit);
        info!("Deposit of {} by {} recorded", amount, depositor);

        let event = BridgeEvent::DepositRecorded {
            deposit,
            head: self.recorded_head,
        };
        self.events.push(event.clone());
        Ok(event)
    }

    /// Fold every pending deposit into the applied chain, in recorded order.
    pub fn apply_deposits(&mut self) -> BridgeEvent {
        let count = self.pending.len();
        let mut head = self.deposit_head();
        for deposit in self.pending.drain(..) {
            head = next_deposit_head(&head, &deposit);
            self.applied.push(deposit);
            self.applied_heads.push(head);
        }
        if count > 0 {
            info!("Applied {} deposits, {} in total", count, self.applied.len());
        }

        let event = BridgeEvent::DepositsApplied { count, head };
        self.events.push(event.clone());
        event
    }

    /// Check that a rollup which replayed `consumed` deposits ending at
    /// `head` only replayed applied ones, in order.
    pub fn check_consumed(&self, consumed: usize, head: &Field) -> Result<(), BridgeError> {
        let Some(applied) = self.head_at(consumed) else {
            warn!(
                "Rollup consumed {} deposits, only {} applied",
                consumed,
                self.applied.len()
            );
            return Err(BridgeError::UnappliedDeposits {
                consumed,
                applied: self.applied.len(),
            });
        };
        if applied != *head {
            warn!("Rollup deposit head diverged after {} deposits", consumed);
            return Err(BridgeError::StateMismatch(StateTree::Deposits));
        }
        Ok(())
    }

    /// Pay out `total_burned - total_withdrawn` against the settled burns.
    pub fn withdraw(
        &mut self,
        settled: &StateRoots,
        request: &WithdrawRequest,
    ) -> Result<BridgeEvent, BridgeError> {
        request.burn_witness.check_height(BURNS_HEIGHT)?;
        request.withdrawal_witness.check_height(WITHDRAWALS_HEIGHT)?;
        if request.burn_witness.calculate_index() != request.withdrawal_witness.calculate_index() {
            return Err(BridgeError::IndexMismatch);
        }

        let amount = request
            .total_burned
            .checked_sub(request.total_withdrawn.unwrap_or(0))
            .ok_or(BridgeError::Underflow)?;

        let burn = Burn::new(request.withdrawer, request.token, request.total_burned);
        if request.burn_witness.calculate_root(&burn.hash()) != settled.burns {
            warn!("Rejected withdrawal by {}: burns root mismatch", request.withdrawer);
            return Err(BridgeError::StateMismatch(StateTree::Burns));
        }
        let withdrawn = request
            .total_withdrawn
            .map(|total| Withdrawal::new(request.withdrawer, request.token, total));
        if request.withdrawal_witness.calculate_root(&leaf_or_empty(withdrawn.as_ref()))
            != self.withdrawals_root
        {
            warn!("Rejected withdrawal by {}: withdrawals root mismatch", request.withdrawer);
            return Err(BridgeError::StateMismatch(StateTree::Withdrawals));
        }

        let available = self.custody(&request.token);
        if available < amount {
            return Err(BridgeError::InsufficientCustody {
                requested: amount,
                available,
            });
        }

        let withdrawal = Withdrawal::new(request.withdrawer, request.token, request.total_burned);
        self.withdrawals_root = request.withdrawal_witness.calculate_root(&withdrawal.hash());
        self.custody.insert(request.token, available - amount);
        info!("Withdrawal of {} by {} paid", amount, request.withdrawer);

        let event = BridgeEvent::Withdrawn {
            withdrawer: request.withdrawer,
            token: request.token,
            amount,
            total: request.total_burned,
        };
        self.events.push(event.clone());
        Ok(event)
    }
}

impl Default for BridgeContract {
    fn default() -> Self {
        Self::new()
    }
}
