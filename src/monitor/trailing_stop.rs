//! Retracement-triggered trailing stop state machine (spec.md §4.11
//! scenario e). Grounded directly on the teacher's
//! `src/application/risk_management/trailing_stops.rs::StopState`
//! (`NoPosition`/`ActiveStop`/`Triggered`, `on_buy`/`on_price_update`),
//! narrowed from the teacher's ATR-multiplier stop distance to spec's
//! fixed 5%-retracement distance, and from `rust_decimal::Decimal` to
//! `f64` per SPEC_FULL.md §2.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrailingStopState {
    Inactive,
    Active {
        entry_price: f64,
        peak_price: f64,
        stop_price: f64,
        retracement_fraction: f64,
    },
    Triggered {
        entry_price: f64,
        exit_price: f64,
        stop_price: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_price: f64,
}

impl Default for TrailingStopState {
    fn default() -> Self {
        TrailingStopState::Inactive
    }
}

impl TrailingStopState {
    /// Installs the stop below the current price by `retracement_fraction`
    /// (spec.md §4.11 "5% retracement-triggered trailing stop"), mirroring
    /// `StopState::on_buy`'s "stop below entry by ATR*multiplier" shape but
    /// anchored to the price at activation rather than the original entry.
    pub fn activate(entry_price: f64, current_price: f64, retracement_fraction: f64) -> Self {
        TrailingStopState::Active {
            entry_price,
            peak_price: current_price,
            stop_price: current_price * (1.0 - retracement_fraction),
            retracement_fraction,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TrailingStopState::Active { .. })
    }

    /// Raises the peak/stop as price makes new highs; triggers once price
    /// falls to or through the stop (`StopState::on_price_update`'s shape).
    pub fn on_price_update(&mut self, price: f64) -> Option<TriggerEvent> {
        let TrailingStopState::Active {
            entry_price,
            peak_price,
            stop_price,
            retracement_fraction,
        } = self
        else {
            return None;
        };

        if price > *peak_price {
            *peak_price = price;
            *stop_price = price * (1.0 - *retracement_fraction);
        }

        if price <= *stop_price {
            let event = TriggerEvent {
                entry_price: *entry_price,
                exit_price: price,
                stop_price: *stop_price,
            };
            *self = TrailingStopState::Triggered {
                entry_price: event.entry_price,
                exit_price: event.exit_price,
                stop_price: event.stop_price,
            };
            return Some(event);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_by_default() {
        assert_eq!(TrailingStopState::default(), TrailingStopState::Inactive);
    }

    #[test]
    fn raises_stop_as_price_climbs_then_triggers_on_5pct_retracement() {
        let mut stop = TrailingStopState::activate(100.0, 120.0, 0.05);
        assert!(stop.on_price_update(130.0).is_none());
        assert!(matches!(stop, TrailingStopState::Active { peak_price, .. } if peak_price == 130.0));

        let trigger = stop.on_price_update(130.0 * 0.95);
        assert!(trigger.is_some());
        assert!(!stop.is_active());
    }

    #[test]
    fn does_not_trigger_while_above_stop() {
        let mut stop = TrailingStopState::activate(100.0, 120.0, 0.05);
        assert!(stop.on_price_update(118.0).is_none());
        assert!(stop.is_active());
    }
}
