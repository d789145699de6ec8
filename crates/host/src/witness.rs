//! Witness generation for transitions
//!
//! Every transition carries the witnesses and prior leaf values it is checked
//! against. The generator reads them from the host's [`RollupState`] and, once
//! a step is proven, replays its writes so the next witnesses line up.

use anyhow::{anyhow, Context as _, Result};
use tidepool_contracts::{BridgeContract, WithdrawRequest};
use tidepool_core::{
    next_deposit_head, Address, Amount, BurnArgs, Context, CreatePoolArgs, Deposit, DepositArgs,
    Outcome, Points, Pool, Proof, ProvideLiquidityArgs, RemoveLiquidityArgs, Signature,
    StateRoots, SwapArgs, TokenId, Transition,
};
use tidepool_merkle::DoubleWitness;
use tracing::debug;

use crate::state::RollupState;

/// Witness generator
#[derive(Clone, Debug)]
pub struct WitnessGenerator {
    state: RollupState,
}

impl WitnessGenerator {
    /// Create a new witness generator
    pub fn new(state: RollupState) -> Self {
        Self { state }
    }

    /// State the witnesses are read from
    pub fn state(&self) -> &RollupState {
        &self.state
    }

    /// Current roots
    pub fn roots(&self) -> StateRoots {
        self.state.roots()
    }

    /// Applied bridge deposits not yet replayed, oldest first.
    ///
    /// Fails if the deposits replayed so far are not a prefix of the bridge's
    /// applied chain.
    pub fn fetch_deposits(&self, bridge: &BridgeContract) -> Result<Vec<Deposit>> {
        let consumed = self.state.deposits_consumed();
        bridge
            .check_consumed(consumed, &self.state.deposit_head())
            .context("Replayed deposits diverge from the bridge")?;
        let fresh = bridge
            .applied_deposits()
            .get(consumed..)
            .unwrap_or_default()
            .to_vec();
        if !fresh.is_empty() {
            debug!("Fetched {} deposits after {}", fresh.len(), consumed);
        }
        Ok(fresh)
    }

    /// Replay the next bridge deposit.
    pub fn deposit(&mut self, deposit: Deposit) -> Result<Transition> {
        let index = self
            .state
            .balances
            .index((deposit.depositor, deposit.token))?;
        let current = self.state.deposit_head();

        Ok(Transition::Deposit(DepositArgs {
            witness: self.state.balances.witness(index)?,
            deposit,
            prior_balance: self.state.balance(&deposit.depositor, &deposit.token),
            current_deposit_head: current,
            expected_deposit_head: next_deposit_head(&current, &deposit),
        }))
    }

    /// Burn `amount` of `token` from `owner`.
    pub fn burn(
        &mut self,
        owner: Address,
        token: TokenId,
        amount: Amount,
        signature: Signature,
    ) -> Result<Transition> {
        let balance_index = self.state.balances.index((owner, token))?;
        let burn_index = self.state.burns.index((owner, token))?;

        Ok(Transition::Burn(BurnArgs {
            balance_witness: self.state.balances.witness(balance_index)?,
            burn_witness: self.state.burns.witness(burn_index)?,
            owner,
            token,
            amount,
            prior_balance: self.state.balance(&owner, &token),
            prior_burned: self.state.burned(&owner, &token),
            signature,
        }))
    }

    /// Create the `(base, quote)` pool from `provider`'s balances.
    pub fn create_pool(
        &mut self,
        provider: Address,
        base: TokenId,
        quote: TokenId,
        base_amount: Amount,
        quote_amount: Amount,
        signature: Signature,
    ) -> Result<Transition> {
        let pool_index = self.state.pools.index((base, quote))?;
        let liquidity_index = self.state.liquidities.index((provider, base, quote))?;

        Ok(Transition::CreatePool(CreatePoolArgs {
            pool_witness: self.state.pools.witness(pool_index)?,
            liquidity_witness: self.state.liquidities.witness(liquidity_index)?,
            balance_witness: self.balance_pair(&provider, &base, &quote)?,
            provider,
            base,
            quote,
            base_amount,
            quote_amount,
            base_balance: self.state.balance(&provider, &base),
            quote_balance: self.state.balance(&provider, &quote),
            signature,
        }))
    }

    /// Add `base_in` base and the matching quote to an existing pool.
    pub fn provide_liquidity(
        &mut self,
        provider: Address,
        base: TokenId,
        quote: TokenId,
        base_in: Amount,
        quote_limit: Amount,
        signature: Signature,
    ) -> Result<Transition> {
        let (pool_index, pool) = self.existing_pool(&base, &quote)?;
        let liquidity_index = self.state.liquidities.index((provider, base, quote))?;

        Ok(Transition::ProvideLiquidity(ProvideLiquidityArgs {
            pool_witness: self.state.pools.witness(pool_index)?,
            liquidity_witness: self.state.liquidities.witness(liquidity_index)?,
            balance_witness: self.balance_pair(&provider, &base, &quote)?,
            provider,
            pool,
            prior_points: self.state.liquidity(&provider, &base, &quote),
            base_balance: self.state.balance(&provider, &base),
            quote_balance: self.state.balance(&provider, &quote),
            base_in,
            quote_limit,
            signature,
        }))
    }

    /// Redeem `points` of an existing pool.
    pub fn remove_liquidity(
        &mut self,
        provider: Address,
        base: TokenId,
        quote: TokenId,
        points: Points,
        base_limit: Amount,
        quote_limit: Amount,
        signature: Signature,
    ) -> Result<Transition> {
        let (pool_index, pool) = self.existing_pool(&base, &quote)?;
        let liquidity_index = self.state.liquidities.index((provider, base, quote))?;

        Ok(Transition::RemoveLiquidity(RemoveLiquidityArgs {
            pool_witness: self.state.pools.witness(pool_index)?,
            liquidity_witness: self.state.liquidities.witness(liquidity_index)?,
            balance_witness: self.balance_pair(&provider, &base, &quote)?,
            provider,
            pool,
            prior_points: self.state.liquidity(&provider, &base, &quote),
            base_balance: self.state.balance(&provider, &base),
            quote_balance: self.state.balance(&provider, &quote),
            points,
            base_limit,
            quote_limit,
            signature,
        }))
    }

    /// Buy `base_out` of the pool's base token, paying at most `quote_limit`.
    pub fn buy(
        &mut self,
        trader: Address,
        base: TokenId,
        quote: TokenId,
        base_out: Amount,
        quote_limit: Amount,
        signature: Signature,
    ) -> Result<Transition> {
        self.swap(trader, base, quote, base_out, quote_limit, signature)
            .map(Transition::Buy)
    }

    /// Buy `quote_out` of the pool's quote token, paying at most `base_limit`.
    pub fn sell(
        &mut self,
        trader: Address,
        base: TokenId,
        quote: TokenId,
        quote_out: Amount,
        base_limit: Amount,
        signature: Signature,
    ) -> Result<Transition> {
        self.swap(trader, base, quote, quote_out, base_limit, signature)
            .map(Transition::Sell)
    }

    /// Execute `transition` against the current state and commit it.
    pub fn apply(
        &mut self,
        transition: &Transition,
        ctx: &Context<'_>,
        earlier: Option<&Proof>,
    ) -> Result<Outcome> {
        let method = transition.method();
        let outcome = transition
            .execute(ctx, &self.state.roots(), earlier)
            .with_context(|| format!("{method} rejected"))?;
        self.commit(transition, &outcome)?;
        Ok(outcome)
    }

    /// Replay the writes of an executed transition.
    pub fn commit(&mut self, transition: &Transition, outcome: &Outcome) -> Result<()> {
        self.state
            .commit(outcome)
            .with_context(|| format!("Failed to commit {}", transition.method()))?;
        if let Transition::Deposit(args) = transition {
            self.state.consume_deposit(args.expected_deposit_head);
        }
        debug!("Committed {}, roots {}", transition.method(), outcome.roots.short());
        Ok(())
    }

    /// Claim for everything `owner` burned of `token` and has not withdrawn.
    ///
    /// The witnesses are taken from the current burns tree, so the request
    /// only succeeds once that state has been settled.
    pub fn withdrawal_request(&self, owner: &Address, token: &TokenId) -> Result<WithdrawRequest> {
        let key = (*owner, *token);
        let index = self
            .state
            .burns
            .find(&key)
            .ok_or_else(|| anyhow!("{owner} has not burned this token"))?;
        let total_burned = self
            .state
            .burned(owner, token)
            .ok_or_else(|| anyhow!("{owner} has not burned this token"))?;

        Ok(WithdrawRequest {
            withdrawer: *owner,
            token: *token,
            burn_witness: self.state.burns.witness(index)?,
            withdrawal_witness: self.state.withdrawals.witness(index)?,
            total_withdrawn: self.state.withdrawn(owner, token),
            total_burned,
        })
    }

    /// Mirror a withdrawal paid by the bridge.
    pub fn record_withdrawal(&mut self, request: &WithdrawRequest) -> Result<()> {
        self.state
            .record_withdrawal(&request.withdrawer, &request.token, request.total_burned)?;
        Ok(())
    }

    fn swap(
        &mut self,
        trader: Address,
        base: TokenId,
        quote: TokenId,
        amount: Amount,
        limit: Amount,
        signature: Signature,
    ) -> Result<SwapArgs> {
        let (pool_index, pool) = self.existing_pool(&base, &quote)?;

        Ok(SwapArgs {
            pool_witness: self.state.pools.witness(pool_index)?,
            balance_witness: self.balance_pair(&trader, &base, &quote)?,
            trader,
            pool,
            base_balance: self.state.balance(&trader, &base),
            quote_balance: self.state.balance(&trader, &quote),
            amount,
            limit,
            signature,
        })
    }

    fn existing_pool(&self, base: &TokenId, quote: &TokenId) -> Result<(u64, Pool)> {
        let key = (*base, *quote);
        match (self.state.pools.find(&key), self.state.pool(base, quote)) {
            (Some(index), Some(pool)) => Ok((index, pool)),
            _ => Err(anyhow!("No pool for this pair")),
        }
    }

    /// Double witness over the base and quote balances of `owner`.
    fn balance_pair(
        &mut self,
        owner: &Address,
        base: &TokenId,
        quote: &TokenId,
    ) -> Result<DoubleWitness> {
        let base_index = self.state.balances.index((*owner, *base))?;
        let quote_index = self.state.balances.index((*owner, *quote))?;
        self.state
            .balances
            .double_witness(base_index, quote_index)
            .context("Base and quote tokens must differ")
    }
}
