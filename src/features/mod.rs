//! C7 — Feature Extractor (spec.md §4.7).
//!
//! Grounded on `src/application/feature_engineering_service.rs`'s "window +
//! patterns -> fixed-shape numeric vector" shape, narrowed to the frozen
//! 12-field contract of [`FeatureVector`]. Feature order and names are
//! frozen; changing either breaks the Scorer's positional contract
//! (spec.md §4.7).

use crate::domain::{Candle, FeatureVector, PatternRecord};
use crate::indicators::ict::MarketStructure;
use crate::indicators::IndicatorEngine;
use crate::patterns::PatternDetector;

/// Minimum candles required before a feature vector is anything but zeros
/// (spec.md §4.7 "Missing / insufficient data -> the entire vector is
/// zeros"). Chosen as the smallest window that gives RSI-14 and a
/// 5-bar momentum lookback both a non-degenerate answer.
const MIN_WINDOW: usize = 15;
const MOMENTUM_LOOKBACK: usize = 5;
const ATR_PERIOD: usize = 14;
const RSI_PERIOD: usize = 14;
const SWING_WINDOW: usize = 5;

pub struct FeatureExtractor {
    pattern_detector: PatternDetector,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            pattern_detector: PatternDetector::new(ATR_PERIOD),
        }
    }

    /// Builds the frozen feature vector from `candles` (oldest-first,
    /// capped trailing window) and the patterns already detected over that
    /// window. Returns the zero vector when `candles` is too short
    /// (spec.md §4.7).
    pub fn extract(&self, candles: &[Candle], engine: &mut IndicatorEngine, patterns: &[PatternRecord]) -> FeatureVector {
        if candles.len() < MIN_WINDOW {
            return FeatureVector::zero();
        }

        let (atr, _) = engine.atr(candles, ATR_PERIOD);
        if atr <= 0.0 {
            return FeatureVector::zero();
        }

        let market_structure = match engine.market_structure(candles, SWING_WINDOW) {
            MarketStructure::Uptrend => 1.0,
            MarketStructure::Downtrend => -1.0,
            MarketStructure::Ranging => 0.0,
        };

        let order_blocks: Vec<&PatternRecord> = patterns.iter().filter(|p| p.is_order_block()).collect();
        let order_blocks_count = (order_blocks.len() as f64).min(10.0) / 10.0;

        let current = candles.last().unwrap();
        let range = current.high - current.low;
        let body = (current.close - current.open).abs();
        let mean_volume = candles.iter().rev().take(20).map(|c| c.volume).sum::<f64>()
            / candles.iter().rev().take(20).count() as f64;
        let institutional_candle = if range > 0.0 && body >= 0.5 * range && current.volume >= 1.2 * mean_volume {
            1.0
        } else {
            0.0
        };

        let liquidity_grab = if patterns.iter().any(|p| p.is_liquidity_sweep()) {
            1.0
        } else {
            0.0
        };

        let fvgs: Vec<&PatternRecord> = patterns.iter().filter(|p| p.is_fvg()).collect();
        let fvg_size_atr = fvgs
            .iter()
            .filter_map(|p| match p {
                PatternRecord::Fvg { size_in_atr, .. } => Some(*size_in_atr),
                _ => None,
            })
            .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc })
            .clamp(-5.0, 5.0)
            / 5.0;

        let fvg_proximity = nearest_proximity(
            fvgs.iter().filter_map(|p| match p {
                PatternRecord::Fvg { start, end, .. } => Some((start + end) / 2.0),
                _ => None,
            }),
            current.close,
            atr,
        );

        let ob_proximity = nearest_proximity(
            order_blocks.iter().filter_map(|p| match p {
                PatternRecord::OrderBlock { reference_price, .. } => Some(*reference_price),
                _ => None,
            }),
            current.close,
            atr,
        );

        let atr_normalized_volume = if mean_volume > 0.0 {
            (current.volume / mean_volume).clamp(0.0, 5.0) / 5.0
        } else {
            0.0
        };

        let (rsi_value, _) = engine.rsi(candles, RSI_PERIOD);
        let rsi_14 = rsi_value / 100.0;

        let lookback_idx = candles.len().saturating_sub(MOMENTUM_LOOKBACK + 1);
        let momentum_atr = ((current.close - candles[lookback_idx].close) / atr)
            .clamp(-2.0, 2.0)
            / 2.0;

        let time_to_next_level = nearest_proximity(
            patterns.iter().filter_map(|p| match p {
                PatternRecord::StructureBreak { level, .. } => Some(*level),
                _ => None,
            }),
            current.close,
            atr,
        );

        let direction_alignment = if market_structure > 0.0 && momentum_atr > 0.0 {
            1.0
        } else if market_structure < 0.0 && momentum_atr < 0.0 {
            1.0
        } else {
            0.0
        };
        let large_fvg = fvgs.iter().any(|p| matches!(p, PatternRecord::Fvg { size_in_atr, .. } if size_in_atr.abs() > 1.0));
        let strong_ob = order_blocks
            .iter()
            .any(|p| matches!(p, PatternRecord::OrderBlock { strength_in_atr, .. } if *strength_in_atr > 1.0));

        let mut confidence_ensemble = 0.0;
        confidence_ensemble += 0.10 * direction_alignment;
        if liquidity_grab > 0.0 {
            confidence_ensemble += 0.15;
        }
        if large_fvg {
            confidence_ensemble += 0.10;
        }
        if strong_ob {
            confidence_ensemble += 0.10;
        }
        if momentum_atr.abs() * 2.0 > 1.0 {
            confidence_ensemble += 0.05;
        }
        confidence_ensemble = confidence_ensemble.clamp(0.0, 1.0);

        FeatureVector {
            market_structure,
            order_blocks_count,
            institutional_candle,
            liquidity_grab,
            fvg_size_atr,
            fvg_proximity,
            ob_proximity,
            atr_normalized_volume,
            rsi_14,
            momentum_atr,
            time_to_next_level,
            confidence_ensemble,
        }
    }

    /// Convenience wrapper running the pattern detector and extraction
    /// together, for callers (the Brain's main loop) that don't need the
    /// intermediate pattern list for anything else.
    pub fn extract_from_window(&self, candles: &[Candle], engine: &mut IndicatorEngine) -> (FeatureVector, Vec<PatternRecord>) {
        let patterns = self.pattern_detector.detect(candles);
        let features = self.extract(candles, engine, &patterns);
        (features, patterns)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Proximity of `price` to the nearest of `levels`, expressed as `1 /
/// (1 + distance_in_atr)` so touching a level yields ~1.0 and levels far
/// away decay toward 0. Returns 0.0 when there are no levels to compare
/// against.
fn nearest_proximity(levels: impl Iterator<Item = f64>, price: f64, atr: f64) -> f64 {
    let nearest = levels
        .map(|level| (level - price).abs() / atr)
        .fold(None, |acc: Option<f64>, d| match acc {
            Some(best) if best <= d => Some(best),
            _ => Some(d),
        });
    match nearest {
        Some(distance) => 1.0 / (1.0 + distance),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let price = 100.0 + i as f64 * 1.5;
                Candle::new(i as i64, price, price + 2.0, price - 1.0, price + 1.0, 100.0 + i as f64)
            })
            .collect()
    }

    #[test]
    fn short_window_yields_zero_vector() {
        let extractor = FeatureExtractor::new();
        let mut engine = IndicatorEngine::new();
        let candles = trending_candles(5);
        let (features, _) = extractor.extract_from_window(&candles, &mut engine);
        assert_eq!(features, FeatureVector::zero());
    }

    #[test]
    fn rising_window_has_positive_momentum_and_rsi_above_half() {
        let extractor = FeatureExtractor::new();
        let mut engine = IndicatorEngine::new();
        let candles = trending_candles(30);
        let (features, _) = extractor.extract_from_window(&candles, &mut engine);
        assert!(features.momentum_atr > 0.0);
        assert!(features.rsi_14 > 0.5);
    }

    #[test]
    fn confidence_ensemble_is_always_clamped() {
        let extractor = FeatureExtractor::new();
        let mut engine = IndicatorEngine::new();
        let candles = trending_candles(40);
        let (features, _) = extractor.extract_from_window(&candles, &mut engine);
        assert!(features.confidence_ensemble >= 0.0 && features.confidence_ensemble <= 1.0);
    }
}
