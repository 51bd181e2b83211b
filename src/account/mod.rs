//! C12 — Account State (spec.md §4.12).
//!
//! Grounded on the teacher's `src/domain/trading/portfolio.rs` (`Portfolio`:
//! cash, positions map, trade history, equity/PnL accessors) and the
//! async-exclusive-lock convention the teacher applies to every piece of
//! shared mutable state (`risk_manager.rs`'s `Arc<RwLock<_>>` services).
//! Single in-process record: "no other state mutation path exists" (spec.md
//! §4.12) — every write to balance/positions/trades goes through
//! [`Account::apply_fill`].

use crate::domain::errors::TradingError;
use crate::domain::{AccountState, OrderSide, Position, Trade};
use tokio::sync::RwLock;
use tracing::info;

/// Commission charged on every fill, as a fraction of notional (spec.md
/// §4.12: "deduct a simple commission (0.1% of notional)").
pub const COMMISSION_RATE: f64 = 0.001;

/// A fill event as it arrives from the (out-of-scope) execution surface,
/// narrowed to what `Account::apply_fill` needs.
#[derive(Debug, Clone)]
pub struct FillEvent {
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: i64,
}

/// The single authoritative record of balance, positions, and trades.
/// Mutated only under its async-exclusive lock, never held across network
/// I/O (spec.md §5).
pub struct Account {
    state: RwLock<AccountState>,
}

impl Account {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            state: RwLock::new(AccountState::new(starting_balance)),
        }
    }

    /// The single read accessor (spec.md §4.12: "`get_balance()` is the
    /// single read accessor; all readers MUST acquire the lock").
    pub async fn get_balance(&self) -> f64 {
        self.state.read().await.balance
    }

    pub async fn snapshot(&self) -> AccountState {
        self.state.read().await.clone()
    }

    pub async fn position_quantity(&self, symbol: &str) -> f64 {
        self.state.read().await.position_quantity(symbol)
    }

    pub async fn has_open_position(&self, symbol: &str) -> bool {
        self.state.read().await.has_open_position(symbol)
    }

    /// Applies an `ORDER_FILLED` event: updates `positions[symbol]`,
    /// appends to `trades`, deducts commission (spec.md §4.12). Refuses to
    /// mutate on an invariant violation rather than silently corrupting
    /// state (spec.md §7 "Account-state invariant violation ... Policy:
    /// refuse to mutate, raise upward").
    pub async fn apply_fill(&self, fill: FillEvent) -> Result<(), TradingError> {
        let mut state = self.state.write().await;

        let notional = fill.price * fill.quantity;
        let commission = notional * COMMISSION_RATE;
        if commission > state.balance + notional {
            return Err(TradingError::InsufficientBalance {
                need: commission,
                available: state.balance,
            });
        }

        let signed_delta = match fill.side {
            OrderSide::Buy => fill.quantity,
            OrderSide::Sell => -fill.quantity,
        };

        let entry = state
            .positions
            .entry(fill.symbol.clone())
            .or_insert(Position {
                quantity: 0.0,
                average_price: fill.price,
            });

        let new_quantity = entry.quantity + signed_delta;
        if entry.quantity == 0.0 || entry.quantity.signum() == signed_delta.signum() {
            let total_notional = entry.average_price * entry.quantity.abs() + notional;
            let total_quantity = entry.quantity.abs() + fill.quantity;
            entry.average_price = if total_quantity > 0.0 {
                total_notional / total_quantity
            } else {
                fill.price
            };
        }
        entry.quantity = new_quantity;

        state.balance -= commission;
        state.trades.push(Trade {
            trade_id: uuid::Uuid::new_v4().to_string(),
            symbol: fill.symbol.clone(),
            side: fill.side,
            price: fill.price,
            quantity: fill.quantity,
            commission,
            timestamp: fill.timestamp,
        });

        info!(
            symbol = %fill.symbol,
            side = %fill.side,
            quantity = fill.quantity,
            commission,
            balance = state.balance,
            "fill applied to account state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buy_then_sell_updates_position_and_charges_commission_both_ways() {
        let account = Account::new(10_000.0);
        account
            .apply_fill(FillEvent {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                price: 100.0,
                quantity: 1.0,
                timestamp: 0,
            })
            .await
            .unwrap();
        assert_eq!(account.position_quantity("BTCUSDT").await, 1.0);

        account
            .apply_fill(FillEvent {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Sell,
                price: 110.0,
                quantity: 1.0,
                timestamp: 1,
            })
            .await
            .unwrap();
        assert_eq!(account.position_quantity("BTCUSDT").await, 0.0);

        let expected_commission = 100.0 * COMMISSION_RATE + 110.0 * COMMISSION_RATE;
        let balance = account.get_balance().await;
        assert!((10_000.0 - balance - expected_commission).abs() < 1e-9);
    }

    #[tokio::test]
    async fn commission_total_matches_sum_over_trades() {
        let account = Account::new(10_000.0);
        for i in 0..5 {
            account
                .apply_fill(FillEvent {
                    symbol: "ETHUSDT".to_string(),
                    side: OrderSide::Buy,
                    price: 50.0,
                    quantity: 1.0,
                    timestamp: i,
                })
                .await
                .unwrap();
        }
        let snapshot = account.snapshot().await;
        let total_commission: f64 = snapshot.trades.iter().map(|t| t.commission).sum();
        assert!((10_000.0 - snapshot.balance - total_commission).abs() < 1e-9);
    }

    #[tokio::test]
    async fn has_open_position_reflects_nonzero_quantity() {
        let account = Account::new(1_000.0);
        assert!(!account.has_open_position("BTCUSDT").await);
        account
            .apply_fill(FillEvent {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                price: 10.0,
                quantity: 1.0,
                timestamp: 0,
            })
            .await
            .unwrap();
        assert!(account.has_open_position("BTCUSDT").await);
    }
}
