//! Keep-latest-per-symbol conflation (spec.md §4.4): "conflates by symbol
//! (keep latest tick per symbol)... deliberate: it smooths bursts and lets
//! the Brain always see the freshest state."

use crate::domain::Candle;
use std::collections::HashMap;

#[derive(Default)]
pub struct Conflator {
    latest: HashMap<String, Candle>,
}

impl Conflator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, symbol: String, candle: Candle) {
        self.latest
            .entry(symbol)
            .and_modify(|existing| {
                if candle.ts_ms >= existing.ts_ms {
                    *existing = candle;
                }
            })
            .or_insert(candle);
    }

    pub fn drain(&mut self) -> Vec<(String, Candle)> {
        self.latest.drain().collect()
    }
}
