//! The frozen 12-field feature vector (spec.md §3, §4.7).
//!
//! Field order and names are part of the public contract: the
//! [`crate::scorer::Scorer`] expects positional semantics, so this struct
//! intentionally has no `#[derive(Default)]`-friendly "add a field anywhere"
//! convenience — `as_array` is the one place the order is spelled out.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub market_structure: f64,
    pub order_blocks_count: f64,
    pub institutional_candle: f64,
    pub liquidity_grab: f64,
    pub fvg_size_atr: f64,
    pub fvg_proximity: f64,
    pub ob_proximity: f64,
    pub atr_normalized_volume: f64,
    pub rsi_14: f64,
    pub momentum_atr: f64,
    pub time_to_next_level: f64,
    pub confidence_ensemble: f64,
}

impl FeatureVector {
    pub const LEN: usize = 12;

    /// Missing/insufficient data → the entire vector is zeros, explicit
    /// rather than undefined (spec.md §4.7).
    pub fn zero() -> Self {
        Self {
            market_structure: 0.0,
            order_blocks_count: 0.0,
            institutional_candle: 0.0,
            liquidity_grab: 0.0,
            fvg_size_atr: 0.0,
            fvg_proximity: 0.0,
            ob_proximity: 0.0,
            atr_normalized_volume: 0.0,
            rsi_14: 0.0,
            momentum_atr: 0.0,
            time_to_next_level: 0.0,
            confidence_ensemble: 0.0,
        }
    }

    /// Canonical positional order, frozen per spec.md §3. The Scorer reads
    /// this, never the named fields directly, so the order can never drift
    /// out from under it.
    pub fn as_array(&self) -> [f64; Self::LEN] {
        [
            self.market_structure,
            self.order_blocks_count,
            self.institutional_candle,
            self.liquidity_grab,
            self.fvg_size_atr,
            self.fvg_proximity,
            self.ob_proximity,
            self.atr_normalized_volume,
            self.rsi_14,
            self.momentum_atr,
            self.time_to_next_level,
            self.confidence_ensemble,
        ]
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zero()
    }
}
