//! C11 — Position Monitor (spec.md §4.11), the richest single component.
//! Grounded in four teacher files (see DESIGN.md): `position_lifecycle.rs`
//! for trailing-stop init/update and pending-order shapes,
//! `trailing_stops.rs` for the `StopState` machine reused as
//! [`trailing_stop::TrailingStopState`], `liquidation_service.rs` for
//! reduce-only forced-close construction (hard kill, priority 0), and
//! `market_regime.rs` for the Market Context read-off-indicators shape
//! ([`context::reconstruct`]). The seven exit scenarios (a–g) themselves
//! are new logic — the teacher's monitor has no equivalent seven-branch
//! priority ladder — composed from the above building blocks.

pub mod context;
pub mod trailing_stop;

use crate::domain::{Candle, Order, OrderSide, Signal};
use crate::features::FeatureExtractor;
use crate::indicators::IndicatorEngine;
use crate::patterns::PatternDetector;
use crate::scorer::Scorer;
use context::{reconstruct, Trend};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tracing::{info, warn};
use trailing_stop::TrailingStopState;

use crate::config::MonitorConfig;

/// A read-only view of one open position at a scheduler tick (spec.md
/// §4.11 "Receives a snapshot of open positions ... does NOT call the
/// exchange itself"). The Monitor never mutates the exchange directly;
/// every decision comes back as an [`Order`] for the caller to route.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: i64,
    pub initial_risk_amount: f64,
    pub mark_price: f64,
    pub now: i64,
    /// Trailing window (oldest-first) ending at the current mark, used to
    /// reconstruct the Market Context and re-score.
    pub window: Vec<Candle>,
}

/// Per-position runtime state owned by the Monitor (spec.md §3 "Per-
/// Position Runtime State"), created on fill and destroyed on close.
#[derive(Debug, Clone)]
struct RuntimeState {
    highest_seen: f64,
    lowest_seen: f64,
    peak_pnl_fraction: f64,
    trailing_stop: TrailingStopState,
    adjustment_count: u32,
    /// `(timestamp_ms, rescored_confidence)` samples, newest last, pruned
    /// beyond what scenario (a)'s 5-minute lookback needs.
    confidence_history: Vec<(i64, f64)>,
}

impl RuntimeState {
    fn new(entry_price: f64) -> Self {
        Self {
            highest_seen: entry_price,
            lowest_seen: entry_price,
            peak_pnl_fraction: 0.0,
            trailing_stop: TrailingStopState::Inactive,
            adjustment_count: 0,
            confidence_history: Vec::new(),
        }
    }

    fn record_confidence(&mut self, now: i64, confidence: f64) {
        self.confidence_history.push((now, confidence));
        let cutoff = now - FIVE_MINUTES_MS * 3;
        self.confidence_history.retain(|(ts, _)| *ts >= cutoff);
    }

    /// Confidence observed at least 5 minutes ago, the closest sample to
    /// that boundary (scenario (a)'s "5-min-prior snapshot").
    fn confidence_five_minutes_ago(&self, now: i64) -> Option<f64> {
        let cutoff = now - FIVE_MINUTES_MS;
        self.confidence_history
            .iter()
            .filter(|(ts, _)| *ts <= cutoff)
            .next_back()
            .map(|(_, c)| *c)
    }
}

const FIVE_MINUTES_MS: i64 = 5 * 60 * 1000;

pub struct PositionMonitor {
    indicator_engine: StdMutex<IndicatorEngine>,
    pattern_detector: PatternDetector,
    feature_extractor: FeatureExtractor,
    scorer: Arc<dyn Scorer>,
    config: MonitorConfig,
    risk_kill_threshold: f64,
    runtime_state: Mutex<HashMap<String, RuntimeState>>,
    /// The signal that opened each position, retrieved from the trade
    /// recorder (spec.md §4.11 step 3). Populated by the caller when an
    /// `ORDER_FILLED` event opens a new position.
    opening_signals: Mutex<HashMap<String, Signal>>,
}

impl PositionMonitor {
    pub fn new(scorer: Arc<dyn Scorer>, config: MonitorConfig, risk_kill_threshold: f64) -> Self {
        Self {
            indicator_engine: StdMutex::new(IndicatorEngine::new()),
            pattern_detector: PatternDetector::new(14),
            feature_extractor: FeatureExtractor::new(),
            scorer,
            config,
            risk_kill_threshold,
            runtime_state: Mutex::new(HashMap::new()),
            opening_signals: Mutex::new(HashMap::new()),
        }
    }

    /// Records which signal opened a position, fed by the Account State's
    /// `ORDER_FILLED` handler (spec.md §4.11 step 3's "trade recorder").
    pub async fn record_opening_signal(&self, symbol: &str, signal: Signal, entry_price: f64) {
        self.opening_signals.lock().await.insert(symbol.to_string(), signal);
        self.runtime_state
            .lock()
            .await
            .insert(symbol.to_string(), RuntimeState::new(entry_price));
    }

    pub async fn forget_position(&self, symbol: &str) {
        self.opening_signals.lock().await.remove(symbol);
        self.runtime_state.lock().await.remove(symbol);
    }

    /// Evaluates every snapshot in the batch, returning the orders to
    /// route for any position that needs closing this tick.
    pub async fn tick(&self, snapshots: Vec<PositionSnapshot>) -> Vec<Order> {
        let mut orders = Vec::new();
        for snapshot in snapshots {
            if let Some(order) = self.evaluate_one(snapshot).await {
                orders.push(order);
            }
        }
        orders
    }

    async fn evaluate_one(&self, snapshot: PositionSnapshot) -> Option<Order> {
        let signed_quantity = match snapshot.side {
            OrderSide::Buy => snapshot.quantity,
            OrderSide::Sell => -snapshot.quantity,
        };
        let unrealized_pnl = (snapshot.mark_price - snapshot.entry_price) * signed_quantity;
        let pnl_fraction = if snapshot.initial_risk_amount > 0.0 {
            unrealized_pnl / snapshot.initial_risk_amount
        } else {
            0.0
        };

        // Priority 0 — hard kill, unconditional, bypasses everything else
        // (spec.md §4.11 step 2, testable property 8).
        if pnl_fraction <= -self.risk_kill_threshold {
            warn!(symbol = %snapshot.symbol, pnl_fraction, "position monitor hard kill triggered");
            let close_side = opposite(snapshot.side);
            return Some(Order::reduce_only_close(
                snapshot.symbol.clone(),
                close_side,
                snapshot.quantity,
                snapshot.now,
            ));
        }

        let has_opening_signal = self.opening_signals.lock().await.contains_key(&snapshot.symbol);
        if !has_opening_signal {
            // No recorded entry reason: skip straight to normal monitoring
            // (spec.md §4.11 step 3 "If absent, skip to normal monitoring").
            return None;
        }

        let market_context = {
            let mut engine = self.indicator_engine.lock().unwrap();
            reconstruct(
                &snapshot.window,
                &mut engine,
                self.config.context_ema_fast_period,
                self.config.context_ema_slow_period,
            )
        };
        let Some(market_context) = market_context else {
            return None;
        };

        let current_confidence = {
            let mut engine = self.indicator_engine.lock().unwrap();
            let patterns = self.pattern_detector.detect(&snapshot.window);
            let features = self.feature_extractor.extract(&snapshot.window, &mut engine, &patterns);
            self.scorer.predict(&features)
        };

        let mut states = self.runtime_state.lock().await;
        let state = states
            .entry(snapshot.symbol.clone())
            .or_insert_with(|| RuntimeState::new(snapshot.entry_price));
        state.highest_seen = state.highest_seen.max(snapshot.mark_price);
        state.lowest_seen = state.lowest_seen.min(snapshot.mark_price);
        state.peak_pnl_fraction = state.peak_pnl_fraction.max(pnl_fraction);
        let prior_confidence = state.confidence_five_minutes_ago(snapshot.now);
        state.record_confidence(snapshot.now, current_confidence);

        // (a) Forced profit take: rescored metric dropped sharply from the
        // 5-minute-prior reading while the position is still in profit.
        if pnl_fraction > 0.0 {
            if let Some(prior) = prior_confidence {
                let drop = if prior > 0.0 { (prior - current_confidence) / prior } else { 0.0 };
                if drop >= self.config.forced_profit_take_drop_fraction {
                    info!(symbol = %snapshot.symbol, drop, "forced profit take");
                    return Some(Order::reduce_only_close(
                        snapshot.symbol.clone(),
                        opposite(snapshot.side),
                        snapshot.quantity,
                        snapshot.now,
                    ));
                }
            }
        }

        // (b) Smart hold: deep drawdown but a confident rebound read — do
        // not close, regardless of what follows.
        let rebound_probability = current_confidence;
        if (-0.99..=-0.50).contains(&pnl_fraction)
            && rebound_probability > self.config.smart_hold_rebound_probability
            && current_confidence >= self.config.smart_hold_confidence_floor
        {
            info!(symbol = %snapshot.symbol, pnl_fraction, "smart hold");
            return None;
        }

        // (c) Entry-reason expired: price has moved far from entry or the
        // position has been held too long, and current confidence no
        // longer supports it.
        let price_move_fraction = if snapshot.entry_price > 0.0 {
            ((snapshot.mark_price - snapshot.entry_price) / snapshot.entry_price).abs()
        } else {
            0.0
        };
        let held_ms = snapshot.now - snapshot.entry_time;
        let max_hold_ms = (self.config.entry_expired_max_hold_hours * 3_600_000.0) as i64;
        let entry_reason_expired = price_move_fraction > self.config.entry_expired_price_move_fraction
            || held_ms > max_hold_ms;
        if entry_reason_expired && current_confidence < self.config.entry_expired_confidence_ceiling {
            info!(symbol = %snapshot.symbol, "entry reason expired");
            return Some(Order::reduce_only_close(
                snapshot.symbol.clone(),
                opposite(snapshot.side),
                snapshot.quantity,
                snapshot.now,
            ));
        }

        // (d) Counter-trend: current market trend now opposes the
        // position's side, and confidence no longer supports holding
        // through it.
        let counter_trend = match (snapshot.side, market_context.trend) {
            (OrderSide::Buy, Trend::Down) => true,
            (OrderSide::Sell, Trend::Up) => true,
            _ => false,
        };
        if counter_trend && current_confidence < self.config.counter_trend_confidence_ceiling {
            info!(symbol = %snapshot.symbol, "counter-trend close");
            return Some(Order::reduce_only_close(
                snapshot.symbol.clone(),
                opposite(snapshot.side),
                snapshot.quantity,
                snapshot.now,
            ));
        }

        // (e) Trailing take-profit: deep in profit with strong
        // trend-continuation and win-probability — install (or update) a
        // 5%-retracement trailing stop instead of closing outright.
        let trend_continuation = current_confidence;
        let win_probability = current_confidence;
        let eligible_for_trailing_tp = pnl_fraction > self.config.trailing_tp_profit_floor
            && trend_continuation > self.config.trailing_tp_trend_continuation_floor
            && win_probability >= self.config.trailing_tp_win_probability_floor;

        if eligible_for_trailing_tp && !state.trailing_stop.is_active() {
            state.trailing_stop = TrailingStopState::activate(
                snapshot.entry_price,
                snapshot.mark_price,
                self.config.trailing_tp_retracement_fraction,
            );
            state.adjustment_count += 1;
            info!(symbol = %snapshot.symbol, "trailing take-profit installed");
            return None;
        }

        if state.trailing_stop.is_active() {
            if let Some(trigger) = state.trailing_stop.on_price_update(snapshot.mark_price) {
                info!(symbol = %snapshot.symbol, exit_price = trigger.exit_price, "trailing take-profit fired");
                return Some(Order::reduce_only_close(
                    snapshot.symbol.clone(),
                    opposite(snapshot.side),
                    snapshot.quantity,
                    snapshot.now,
                ));
            }
            // still active, not yet triggered: normal monitor continues
        }

        // (f) OCO fired is handled by the exchange side; there is no local
        // OCO state to reconcile in this core (spec.md §4.11 scenario f —
        // "let exchange handle, clean up local state" has no counterpart
        // here since OCO placement itself is out of scope per spec §1).

        // (g) Normal monitor: nothing to do this tick.
        None
    }
}

fn opposite(side: OrderSide) -> OrderSide {
    match side {
        OrderSide::Buy => OrderSide::Sell,
        OrderSide::Sell => OrderSide::Buy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatternRecord;
    use crate::scorer::HeuristicScorer;

    fn flat_window(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64, price, price + 1.0, price - 1.0, price, 10.0))
            .collect()
    }

    fn default_config() -> MonitorConfig {
        MonitorConfig {
            forced_profit_take_drop_fraction: 0.20,
            smart_hold_rebound_probability: 0.70,
            smart_hold_confidence_floor: 0.80,
            entry_expired_price_move_fraction: 0.02,
            entry_expired_max_hold_hours: 48.0,
            entry_expired_confidence_ceiling: 0.70,
            counter_trend_confidence_ceiling: 0.80,
            trailing_tp_profit_floor: 0.20,
            trailing_tp_trend_continuation_floor: 0.70,
            trailing_tp_win_probability_floor: 0.80,
            trailing_tp_retracement_fraction: 0.05,
            context_ema_fast_period: 20,
            context_ema_slow_period: 50,
            tick_interval_ms: 1000,
        }
    }

    fn monitor() -> PositionMonitor {
        PositionMonitor::new(Arc::new(HeuristicScorer::new()), default_config(), 0.99)
    }

    #[tokio::test]
    async fn hard_kill_fires_unconditionally_on_extreme_loss() {
        let m = monitor();
        let snapshot = PositionSnapshot {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            quantity: 1.0,
            entry_price: 100.0,
            entry_time: 0,
            initial_risk_amount: 2.0,
            mark_price: 98.01,
            now: 1_000,
            window: flat_window(20, 98.01),
        };
        let orders = m.tick(vec![snapshot]).await;
        assert_eq!(orders.len(), 1);
        assert!(orders[0].reduce_only);
        assert_eq!(orders[0].side, OrderSide::Sell);
    }

    #[tokio::test]
    async fn no_action_without_a_recorded_opening_signal() {
        let m = monitor();
        let snapshot = PositionSnapshot {
            symbol: "ETHUSDT".to_string(),
            side: OrderSide::Buy,
            quantity: 1.0,
            entry_price: 100.0,
            entry_time: 0,
            initial_risk_amount: 10.0,
            mark_price: 101.0,
            now: 1_000,
            window: flat_window(20, 101.0),
        };
        let orders = m.tick(vec![snapshot]).await;
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn entry_reason_expired_closes_when_confidence_has_faded() {
        let m = monitor();
        let signal = Signal::new("ETHUSDT", 0.5, Vec::<PatternRecord>::new(), 10.0, 0);
        m.record_opening_signal("ETHUSDT", signal, 100.0).await;

        let snapshot = PositionSnapshot {
            symbol: "ETHUSDT".to_string(),
            side: OrderSide::Buy,
            quantity: 1.0,
            entry_price: 100.0,
            entry_time: 0,
            initial_risk_amount: 10.0,
            mark_price: 105.0,
            now: 1_000,
            window: flat_window(60, 105.0),
        };
        let orders = m.tick(vec![snapshot]).await;
        assert_eq!(orders.len(), 1);
        assert!(orders[0].reduce_only);
    }

    #[tokio::test]
    async fn forgetting_a_position_clears_its_runtime_state() {
        let m = monitor();
        let signal = Signal::new("SOLUSDT", 0.5, Vec::<PatternRecord>::new(), 10.0, 0);
        m.record_opening_signal("SOLUSDT", signal, 100.0).await;
        m.forget_position("SOLUSDT").await;
        assert!(m.opening_signals.lock().await.is_empty());
        assert!(m.runtime_state.lock().await.is_empty());
    }
}
