//! Leaf records of the state trees and the bridge
//!
//! A leaf is stored in its tree as the Keccak256 hash of its field elements.
//! A slot that was never written holds [`EMPTY_LEAF`]; callers model that as
//! `None` rather than as a zero-valued record.

use serde::{Deserialize, Serialize};
use tidepool_merkle::{Keccak256Hasher, EMPTY_LEAF};

use crate::types::{field_from_u128, field_from_u64, Address, Amount, Field, Points, TokenId};

/// A record that can be committed as a tree leaf
pub trait Leaf {
    /// Field elements hashed into the leaf
    fn to_fields(&self) -> Vec<Field>;

    /// Canonical byte layout
    fn to_bytes(&self) -> Vec<u8>;

    /// Keccak256 of the field elements
    fn hash(&self) -> Field {
        Keccak256Hasher::hash_fields(&self.to_fields())
    }
}

/// Leaf value of a slot that may not have been written yet.
pub fn leaf_or_empty<L: Leaf>(leaf: Option<&L>) -> Field {
    leaf.map_or(EMPTY_LEAF, Leaf::hash)
}

fn account_fields(account: &Address, token: &TokenId, amount: Amount) -> Vec<Field> {
    let [low, high] = account.to_fields();
    vec![low, high, *token, field_from_u64(amount)]
}

fn account_bytes(account: &Address, token: &TokenId, amount: Amount) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(95);
    bytes.extend_from_slice(account.as_bytes());
    bytes.extend_from_slice(token);
    bytes.extend_from_slice(&amount.to_le_bytes());
    bytes
}

macro_rules! account_leaf {
    ($(#[$meta:meta])* $name:ident, $account:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            /// Account the amount belongs to
            pub $account: Address,
            /// Token of the amount
            pub token: TokenId,
            /// Amount held or accumulated
            pub amount: Amount,
        }

        impl $name {
            /// Record for one account and token
            pub fn new($account: Address, token: TokenId, amount: Amount) -> Self {
                Self { $account, token, amount }
            }
        }

        impl Leaf for $name {
            fn to_fields(&self) -> Vec<Field> {
                account_fields(&self.$account, &self.token, self.amount)
            }

            fn to_bytes(&self) -> Vec<u8> {
                account_bytes(&self.$account, &self.token, self.amount)
            }
        }
    };
}

account_leaf!(
    /// Token balance of one owner
    Balance,
    owner
);
account_leaf!(
    /// Cumulative amount ever burned by one owner for one token
    Burn,
    burner
);
account_leaf!(
    /// Cumulative amount already paid out by the bridge, index-aligned with [`Burn`]
    Withdrawal,
    withdrawer
);
account_leaf!(
    /// Base-ledger deposit accumulated into the bridge hash chain
    Deposit,
    depositor
);

/// Reserves of one trading pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Base token
    pub base: TokenId,
    /// Quote token
    pub quote: TokenId,
    /// Base reserve
    pub base_amount: Amount,
    /// Quote reserve
    pub quote_amount: Amount,
    /// Points issued to providers
    pub total_points: Points,
}

impl Leaf for Pool {
    fn to_fields(&self) -> Vec<Field> {
        vec![
            self.base,
            self.quote,
            field_from_u64(self.base_amount),
            field_from_u64(self.quote_amount),
            field_from_u128(self.total_points),
        ]
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(96);
        bytes.extend_from_slice(&self.base);
        bytes.extend_from_slice(&self.quote);
        bytes.extend_from_slice(&self.base_amount.to_le_bytes());
        bytes.extend_from_slice(&self.quote_amount.to_le_bytes());
        bytes.extend_from_slice(&self.total_points.to_le_bytes());
        bytes
    }
}

/// Liquidity points held by one provider in one pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liquidity {
    /// Liquidity provider
    pub provider: Address,
    /// Base token of the pool
    pub base: TokenId,
    /// Quote token of the pool
    pub quote: TokenId,
    /// Points held
    pub points: Points,
}

impl Leaf for Liquidity {
    fn to_fields(&self) -> Vec<Field> {
        let [low, high] = self.provider.to_fields();
        vec![low, high, self.base, self.quote, field_from_u128(self.points)]
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(135);
        bytes.extend_from_slice(self.provider.as_bytes());
        bytes.extend_from_slice(&self.base);
        bytes.extend_from_slice(&self.quote);
        bytes.extend_from_slice(&self.points.to_le_bytes());
        bytes
    }
}

/// Extend the deposit hash chain by one record.
pub fn next_deposit_head(head: &Field, deposit: &Deposit) -> Field {
    Keccak256Hasher::hash_pair(head, &deposit.hash())
}
