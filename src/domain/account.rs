//! Account state data shapes (spec.md §3, §4.12).
//!
//! Grounded on the teacher's `src/domain/trading/portfolio.rs` (`Portfolio`/
//! `Position`, equity/PnL accessors), narrowed to `f64` per SPEC_FULL.md §2.

use crate::domain::signal::OrderSide;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub average_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub timestamp: i64,
}

/// `{balance, positions: map symbol -> signed quantity, trades: append-only
/// list}` (spec.md §3). Mutated only through [`crate::account::Account`]'s
/// async-exclusive lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: f64,
    pub positions: HashMap<String, Position>,
    pub trades: Vec<Trade>,
}

impl AccountState {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            balance: starting_balance,
            positions: HashMap::new(),
            trades: Vec::new(),
        }
    }

    pub fn position_quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map(|p| p.quantity).unwrap_or(0.0)
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.position_quantity(symbol) != 0.0
    }
}
