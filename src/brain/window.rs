//! Per-symbol capped candle window (spec.md §4.9 step 4), directly
//! grounded on the teacher's `src/domain/trading/symbol_context.rs`
//! (`SymbolContext::update` pushing into a `VecDeque<Candle>` capped at
//! 100 via `if len >= 100 { pop_front() }` then `push_back()`). This is a
//! narrower, purpose-built version: no strategy, position-manager, or
//! regime-detector fields — those concerns live in `crate::risk` and
//! `crate::monitor` in this core.

use crate::domain::Candle;
use std::collections::VecDeque;

pub const MAX_WINDOW: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct SymbolWindow {
    candles: VecDeque<Candle>,
}

impl SymbolWindow {
    pub fn new() -> Self {
        Self { candles: VecDeque::new() }
    }

    /// Appends one candle, dropping the oldest once the window exceeds
    /// [`MAX_WINDOW`] (spec.md §4.9 step 4).
    pub fn push(&mut self, candle: Candle) {
        if self.candles.len() >= MAX_WINDOW {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// A contiguous, oldest-first snapshot for the Pattern Detector/Feature
    /// Extractor, which both expect a plain slice.
    pub fn as_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.candles.back().map(|c| c.ts_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64) -> Candle {
        Candle::new(ts, 100.0, 101.0, 99.0, 100.0, 10.0)
    }

    #[test]
    fn drops_oldest_beyond_max_window() {
        let mut window = SymbolWindow::new();
        for i in 0..150 {
            window.push(candle(i));
        }
        assert_eq!(window.len(), MAX_WINDOW);
        let snapshot = window.as_vec();
        assert_eq!(snapshot.first().unwrap().ts_ms, 50);
        assert_eq!(snapshot.last().unwrap().ts_ms, 149);
    }
}
