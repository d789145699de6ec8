//! DEX logic

pub mod amm;

pub use amm::{apply_fee, buy_cost, credit, debit, provide_amounts, remove_amounts, sell_cost};
