//! Base-ledger contracts
//!
//! The settlement contract holds the last accepted state roots. The bridge
//! holds custody of deposited tokens, commits deposits to a hash chain and
//! pays out withdrawals against burns in the settled state. Neither owns the
//! other: the bridge is handed the settled roots on every withdrawal.

pub mod bridge;
pub mod settlement;

pub use bridge::{BridgeContract, BridgeError, BridgeEvent, WithdrawRequest};
pub use settlement::{SettlementContract, SettlementError};
