//! Signal and Order — spec.md §3.
//!
//! A `Signal` is produced by the Brain and consumed once by the Risk Gate.
//! An `Order` is created by the Risk Gate, transitions to `Filled` or
//! `Rejected` by the (out-of-scope) execution surface, then is incorporated
//! into [`crate::account::AccountState`].

use crate::domain::pattern::PatternRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: Uuid,
    pub symbol: String,
    pub confidence: f64,
    pub patterns: Vec<PatternRecord>,
    pub position_size: f64,
    pub timestamp: i64,
}

impl Signal {
    pub fn new(
        symbol: impl Into<String>,
        confidence: f64,
        patterns: Vec<PatternRecord>,
        position_size: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            signal_id: Uuid::new_v4(),
            symbol: symbol.into(),
            confidence: confidence.clamp(0.0, 1.0),
            patterns,
            position_size,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Filled,
    Rejected,
}

/// Why a reduce-only close was requested by the Position Monitor (C11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    RiskKill,
    ForcedProfitTake,
    EntryReasonExpired,
    CounterTrend,
    OcoHandoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    pub confidence: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub leverage: Option<f64>,
    pub reduce_only: bool,
    pub status: OrderStatus,
    pub timestamp: i64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        order_type: OrderType,
        confidence: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            quantity,
            order_type,
            confidence,
            stop_loss: None,
            take_profit: None,
            leverage: None,
            reduce_only: false,
            status: OrderStatus::New,
            timestamp,
        }
    }

    /// Construct a reduce-only close order, per spec.md §4.11 ("All closes
    /// are reduce-only to prevent reversing the position").
    pub fn reduce_only_close(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        timestamp: i64,
    ) -> Self {
        let mut order = Self::new(symbol, side, quantity, OrderType::Market, 1.0, timestamp);
        order.reduce_only = true;
        order
    }
}

/// Exchange symbol filters (spec.md §6 `exchangeInfo`), exposed to
/// downstream position sizing. Rounding to `step_size`/`tick_size` happens
/// at the execution boundary, outside this core (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub min_qty: f64,
    pub step_size: f64,
    pub min_notional: f64,
    pub tick_size: f64,
}
