//! C10 — Risk Gate (spec.md §4.10).
//!
//! Grounded in `src/application/risk_management/risk_manager.rs`'s
//! validator-pipeline architecture (`RiskValidationPipeline` over
//! `Vec<Box<dyn RiskValidator>>`), narrowed to the three checks spec.md
//! names: position-size-vs-balance-fraction, minimum confidence, and
//! per-symbol exclusivity. The teacher's PDT/sector/correlation/sentiment/
//! circuit-breaker validators have no equities-regulatory counterpart in
//! this core and are not carried forward (see DESIGN.md). Per-symbol
//! exclusivity is grounded in
//! `src/application/risk_management/state/pending_orders_tracker.rs`
//! (a tracked set of symbols with open orders, checked before admission).

use crate::account::Account;
use crate::config::RiskConfig;
use crate::domain::{Order, OrderSide, OrderType, Signal};
use crate::eventbus::{EventBus, EventPayload, Listener, Topic};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Why the Risk Gate declined to admit a signal (spec.md §4.10, §7).
#[derive(Debug, Clone, PartialEq)]
pub enum RiskRejectReason {
    PositionSizeExceeded { size: f64, cap: f64 },
    ConfidenceBelowMinimum { confidence: f64, min: f64 },
    SymbolAlreadyPending { symbol: String },
}

impl std::fmt::Display for RiskRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskRejectReason::PositionSizeExceeded { size, cap } => {
                write!(f, "position size {size:.4} exceeds cap {cap:.4}")
            }
            RiskRejectReason::ConfidenceBelowMinimum { confidence, min } => {
                write!(f, "confidence {confidence:.4} below minimum {min:.4}")
            }
            RiskRejectReason::SymbolAlreadyPending { symbol } => {
                write!(f, "symbol {symbol} already has a pending position")
            }
        }
    }
}

/// Tracks symbols with an order in flight between `ORDER_REQUEST` and
/// `ORDER_FILLED`/close, serializing admission per symbol (spec.md §4.10
/// "No pending position in this symbol"). A narrower analogue of the
/// teacher's `PendingOrdersTracker`, keyed on symbol rather than order id
/// since the Risk Gate only needs exclusivity, not full order bookkeeping.
#[derive(Default)]
struct PendingSymbols {
    symbols: HashSet<String>,
}

impl PendingSymbols {
    fn has_pending(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    fn mark_pending(&mut self, symbol: &str) {
        self.symbols.insert(symbol.to_string());
    }

    fn clear_pending(&mut self, symbol: &str) {
        self.symbols.remove(symbol);
    }
}

pub struct RiskGate {
    account: Arc<Account>,
    event_bus: Arc<EventBus>,
    config: RiskConfig,
    pending: Mutex<PendingSymbols>,
}

impl RiskGate {
    pub fn new(account: Arc<Account>, event_bus: Arc<EventBus>, config: RiskConfig) -> Self {
        Self {
            account,
            event_bus,
            config,
            pending: Mutex::new(PendingSymbols::default()),
        }
    }

    /// Releases the per-symbol exclusivity hold, called once the position
    /// the admitted order opened is closed or the order itself is
    /// rejected/cancelled downstream.
    pub async fn release_symbol(&self, symbol: &str) {
        self.pending.lock().await.clear_pending(symbol);
    }

    /// Evaluates one signal against the three admission checks, in the
    /// order spec.md §4.10 lists them. Returns `Ok(Order)` on admission —
    /// the caller is responsible for publishing `ORDER_REQUEST` — or the
    /// first failing [`RiskRejectReason`].
    pub async fn evaluate(&self, signal: &Signal) -> Result<Order, RiskRejectReason> {
        let balance = self.account.get_balance().await;
        let cap = balance * self.config.max_trade_risk_fraction;
        if signal.position_size > cap {
            return Err(RiskRejectReason::PositionSizeExceeded {
                size: signal.position_size,
                cap,
            });
        }

        if signal.confidence < self.config.min_confidence_for_trade {
            return Err(RiskRejectReason::ConfidenceBelowMinimum {
                confidence: signal.confidence,
                min: self.config.min_confidence_for_trade,
            });
        }

        let mut pending = self.pending.lock().await;
        if pending.has_pending(&signal.symbol) || self.account.has_open_position(&signal.symbol).await {
            return Err(RiskRejectReason::SymbolAlreadyPending {
                symbol: signal.symbol.clone(),
            });
        }
        pending.mark_pending(&signal.symbol);
        drop(pending);

        let side = if signal.confidence > 0.5 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        Ok(Order::new(
            signal.symbol.clone(),
            side,
            signal.position_size,
            OrderType::Market,
            signal.confidence,
            signal.timestamp,
        ))
    }

    /// Evaluates and, on admission, publishes `ORDER_REQUEST`. On
    /// rejection logs the reason and publishes nothing (spec.md §4.10,
    /// testable property 7).
    pub async fn admit(&self, signal: Signal) {
        match self.evaluate(&signal).await {
            Ok(order) => {
                info!(
                    symbol = %order.symbol,
                    side = %order.side,
                    quantity = order.quantity,
                    confidence = order.confidence,
                    "risk gate admitted signal, publishing order request"
                );
                self.event_bus
                    .publish(Topic::OrderRequest, EventPayload::OrderRequest(order))
                    .await;
            }
            Err(reason) => {
                warn!(symbol = %signal.symbol, %reason, "risk gate rejected signal");
            }
        }
    }
}

#[async_trait]
impl Listener for RiskGate {
    async fn on_event(&self, payload: &EventPayload) {
        if let EventPayload::SignalGenerated(signal) = payload {
            self.admit(signal.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatternRecord;

    fn signal(symbol: &str, confidence: f64, position_size: f64) -> Signal {
        Signal::new(symbol, confidence, Vec::<PatternRecord>::new(), position_size, 0)
    }

    fn gate(balance: f64) -> RiskGate {
        RiskGate::new(
            Arc::new(Account::new(balance)),
            Arc::new(EventBus::new()),
            RiskConfig {
                max_trade_risk_fraction: 0.02,
                min_confidence_for_trade: 0.60,
                permissive_confidence_threshold: 0.30,
                risk_kill_threshold: 0.99,
            },
        )
    }

    #[tokio::test]
    async fn rejects_position_size_above_cap() {
        let gate = gate(10_000.0);
        let result = gate.evaluate(&signal("BTCUSDT", 0.9, 300.0)).await;
        assert!(matches!(result, Err(RiskRejectReason::PositionSizeExceeded { .. })));
    }

    #[tokio::test]
    async fn admits_position_size_at_or_below_cap() {
        let gate = gate(10_000.0);
        let result = gate.evaluate(&signal("BTCUSDT", 0.9, 200.0)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rejects_confidence_below_minimum() {
        let gate = gate(10_000.0);
        let result = gate.evaluate(&signal("BTCUSDT", 0.5, 100.0)).await;
        assert!(matches!(result, Err(RiskRejectReason::ConfidenceBelowMinimum { .. })));
    }

    #[tokio::test]
    async fn second_signal_for_pending_symbol_is_rejected() {
        let gate = gate(10_000.0);
        assert!(gate.evaluate(&signal("BTCUSDT", 0.9, 100.0)).await.is_ok());
        let result = gate.evaluate(&signal("BTCUSDT", 0.9, 100.0)).await;
        assert!(matches!(result, Err(RiskRejectReason::SymbolAlreadyPending { .. })));
    }

    #[tokio::test]
    async fn releasing_symbol_allows_a_new_admission() {
        let gate = gate(10_000.0);
        assert!(gate.evaluate(&signal("BTCUSDT", 0.9, 100.0)).await.is_ok());
        gate.release_symbol("BTCUSDT").await;
        assert!(gate.evaluate(&signal("BTCUSDT", 0.9, 100.0)).await.is_ok());
    }

    #[tokio::test]
    async fn buy_side_chosen_above_half_confidence() {
        let gate = gate(10_000.0);
        let order = gate.evaluate(&signal("ETHUSDT", 0.9, 50.0)).await.unwrap();
        assert_eq!(order.side, OrderSide::Buy);
    }
}
