//! Constant-product AMM arithmetic
//!
//! Products are computed in 256 bits and narrowed back, so a result that
//! does not fit its target width is an overflow rather than a wrap.

use alloy_primitives::U256;

use crate::{
    error::{Result, TransitionError},
    leaves::Pool,
    types::{Amount, Points},
};

/// Fee numerator over [`FEE_DENOMINATOR`], i.e. 0.1%
pub const FEE_NUMERATOR: u64 = 1001;
/// Fee denominator
pub const FEE_DENOMINATOR: u64 = 1000;

fn narrow_amount(value: U256) -> Result<Amount> {
    u64::try_from(value).map_err(|_| TransitionError::Overflow)
}

fn narrow_points(value: U256) -> Result<Points> {
    u128::try_from(value).map_err(|_| TransitionError::Overflow)
}

/// `floor(amount * 1001 / 1000)`
pub fn apply_fee(amount: Amount) -> Result<Amount> {
    narrow_amount(U256::from(amount) * U256::from(FEE_NUMERATOR) / U256::from(FEE_DENOMINATOR))
}

/// Amount the other side must grow by to keep `reserve_out * reserve_in`
/// after `out` leaves `reserve_out`, fee excluded.
fn swap_cost(reserve_out: Amount, reserve_in: Amount, out: Amount) -> Result<Amount> {
    let remaining = reserve_out.checked_sub(out).ok_or(TransitionError::Underflow)?;
    if remaining == 0 {
        return Err(TransitionError::ZeroAmount("pool reserve after swap"));
    }
    let k = U256::from(reserve_out) * U256::from(reserve_in);
    let required = narrow_amount(k / U256::from(remaining))?;
    required.checked_sub(reserve_in).ok_or(TransitionError::Underflow)
}

/// Quote paid, fee included, for taking `base_out` from the pool.
pub fn buy_cost(pool_base: Amount, pool_quote: Amount, base_out: Amount) -> Result<Amount> {
    apply_fee(swap_cost(pool_base, pool_quote, base_out)?)
}

/// Base paid, fee included, for taking `quote_out` from the pool.
pub fn sell_cost(pool_base: Amount, pool_quote: Amount, quote_out: Amount) -> Result<Amount> {
    apply_fee(swap_cost(pool_quote, pool_base, quote_out)?)
}

/// Quote required and points minted for adding `base_in` to `pool`.
pub fn provide_amounts(pool: &Pool, base_in: Amount) -> Result<(Amount, Points)> {
    if base_in == 0 {
        return Err(TransitionError::ZeroAmount("base amount"));
    }
    if pool.base_amount == 0 {
        return Err(TransitionError::ZeroAmount("pool base amount"));
    }
    let pool_base = U256::from(pool.base_amount);
    let minted = narrow_points(U256::from(pool.total_points) * U256::from(base_in) / pool_base)?;
    let quote_in = narrow_amount(U256::from(base_in) * U256::from(pool.quote_amount) / pool_base)?;
    Ok((quote_in, minted))
}

/// Base and quote released by burning `points` of `pool`.
pub fn remove_amounts(pool: &Pool, points: Points) -> Result<(Amount, Amount)> {
    if points == 0 {
        return Err(TransitionError::ZeroAmount("liquidity points"));
    }
    if pool.total_points == 0 {
        return Err(TransitionError::ZeroAmount("pool liquidity points"));
    }
    if pool.base_amount == 0 {
        return Err(TransitionError::ZeroAmount("pool base amount"));
    }
    let total = U256::from(pool.total_points);
    let points = U256::from(points);
    let base_out = narrow_amount(U256::from(pool.base_amount) * points / total)?;
    let quote_out = narrow_amount(U256::from(pool.quote_amount) * points / total)?;
    Ok((base_out, quote_out))
}

/// Add to a leaf amount, treating a missing leaf as zero.
pub fn credit(prior: Option<Amount>, amount: Amount) -> Result<Amount> {
    prior
        .unwrap_or(0)
        .checked_add(amount)
        .ok_or(TransitionError::Overflow)
}

/// Subtract from a leaf amount, treating a missing leaf as zero.
pub fn debit(prior: Option<Amount>, amount: Amount) -> Result<Amount> {
    prior
        .unwrap_or(0)
        .checked_sub(amount)
        .ok_or(TransitionError::Underflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::token_id;
    use proptest::prelude::*;

    fn pool(base_amount: u64, quote_amount: u64, total_points: u128) -> Pool {
        Pool {
            base: token_id("MINA"),
            quote: token_id("USDC"),
            base_amount,
            quote_amount,
            total_points,
        }
    }

    #[test]
    fn test_buy_reference_values() {
        let base = 32_000_000u64;
        let quote = 50_000_000u64;
        let k = base as u128 * quote as u128;
        let cost = (k / (base as u128 - 1_000_000)) as u64 - quote;
        assert_eq!(cost, 1_612_903);
        assert_eq!(buy_cost(base, quote, 1_000_000).unwrap(), 1_614_515);
    }

    #[test]
    fn test_swap_draining_pool_rejected() {
        assert_eq!(
            buy_cost(10, 10, 10),
            Err(TransitionError::ZeroAmount("pool reserve after swap"))
        );
        assert_eq!(sell_cost(10, 10, 11), Err(TransitionError::Underflow));
    }

    #[test]
    fn test_fee_rounds_down() {
        assert_eq!(apply_fee(999).unwrap(), 999);
        assert_eq!(apply_fee(1000).unwrap(), 1001);
        assert_eq!(apply_fee(u64::MAX), Err(TransitionError::Overflow));
    }

    #[test]
    fn test_provide_amounts() {
        let pool = pool(32_000_000, 50_000_000, 1_600_000_000_000_000);
        let (quote_in, minted) = provide_amounts(&pool, 3_200_000).unwrap();
        assert_eq!(quote_in, 5_000_000);
        assert_eq!(minted, 160_000_000_000_000);
        assert!(provide_amounts(&pool, 0).is_err());
    }

    #[test]
    fn test_remove_amounts() {
        let pool = pool(32_000_000, 50_000_000, 1_600_000_000_000_000);
        let (base_out, quote_out) = remove_amounts(&pool, 160_000_000_000_000).unwrap();
        assert_eq!(base_out, 3_200_000);
        assert_eq!(quote_out, 5_000_000);
        assert_eq!(
            remove_amounts(&pool, 0),
            Err(TransitionError::ZeroAmount("liquidity points"))
        );
    }

    #[test]
    fn test_credit_and_debit() {
        assert_eq!(credit(None, 5).unwrap(), 5);
        assert_eq!(credit(Some(u64::MAX), 1), Err(TransitionError::Overflow));
        assert_eq!(debit(Some(5), 5).unwrap(), 0);
        assert_eq!(debit(None, 1), Err(TransitionError::Underflow));
    }

    proptest! {
        #[test]
        fn prop_buy_keeps_product(
            base in 1_000_000u64..1_000_000_000_000,
            quote in 1_000_000u64..1_000_000_000_000,
            divisor in 2u64..100,
        ) {
            let base_out = base / divisor;
            let paid = buy_cost(base, quote, base_out).unwrap();
            let before = base as u128 * quote as u128;
            let after = (base - base_out) as u128 * (quote + paid) as u128;
            prop_assert!(after >= before);
        }

        #[test]
        fn prop_sell_keeps_product(
            base in 1_000_000u64..1_000_000_000_000,
            quote in 1_000_000u64..1_000_000_000_000,
            divisor in 2u64..100,
        ) {
            let quote_out = quote / divisor;
            let paid = sell_cost(base, quote, quote_out).unwrap();
            let before = base as u128 * quote as u128;
            let after = (base + paid) as u128 * (quote - quote_out) as u128;
            prop_assert!(after >= before);
        }
    }
}
