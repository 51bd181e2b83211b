//! C6 — Pattern Detector (spec.md §4.6).
//!
//! Grounded directly on `src/application/strategies/smc.rs`'s FVG, order
//! block, and swing-point detection, generalized from that file's
//! single-signal `analyze()` shape into the spec's `PatternRecord` catalog
//! (Fair Value Gap, Order Block, Liquidity Sweep, Break of Structure,
//! Swing Point), every magnitude re-expressed in ATR units. Stateless: a
//! fresh detector can be constructed per call with no carried state, and
//! recomputing over the same window twice returns identical records.

use crate::domain::{Candle, PatternRecord, PatternSide};
use crate::indicators::formulas::atr as atr_of;

const MAX_WINDOW: usize = 20;
const OB_VOLUME_MULT: f64 = 1.2;
const OB_BODY_FRACTION: f64 = 0.5;
const LIQUIDITY_LOOKBACK: usize = 10;
const BOS_LOOKBACK: usize = 5;
const SWING_WINDOW: usize = 5;

pub struct PatternDetector {
    atr_period: usize,
}

impl PatternDetector {
    pub fn new(atr_period: usize) -> Self {
        Self { atr_period }
    }

    /// Detects every pattern kind over the trailing window (capped at
    /// [`MAX_WINDOW`] candles, spec.md §4.6 "small trailing window (≤ 20
    /// candles)"). Candles are oldest-first.
    pub fn detect(&self, candles: &[Candle]) -> Vec<PatternRecord> {
        let window_start = candles.len().saturating_sub(MAX_WINDOW);
        let window = &candles[window_start..];

        let (atr, _) = atr_of(window, self.atr_period);
        if atr <= 0.0 {
            return Vec::new();
        }

        let mut records = Vec::new();
        records.extend(self.detect_fvg(window, atr));
        records.extend(self.detect_order_block(window, atr));
        if let Some(sweep) = self.detect_liquidity_sweep(window, atr) {
            records.push(sweep);
        }
        if let Some(bos) = self.detect_break_of_structure(window) {
            records.push(bos);
        }
        records
    }

    /// Bullish FVG: `low[c1] > high[c3]` (spec.md §4.6 "bullish if
    /// low[t−2] > high[t]"), the middle candle bridging the gap. Bearish is
    /// the mirror image, `high[c1] < low[c3]`.
    fn detect_fvg(&self, window: &[Candle], atr: f64) -> Vec<PatternRecord> {
        let mut found = Vec::new();
        if window.len() < 3 {
            return found;
        }
        for i in 0..window.len() - 2 {
            let c1 = &window[i];
            let c3 = &window[i + 2];
            if c3.low > c1.high {
                let gap = c3.low - c1.high;
                found.push(PatternRecord::Fvg {
                    kind: PatternSide::Bearish,
                    start: c1.high,
                    end: c3.low,
                    size_in_atr: gap / atr,
                });
            } else if c1.low > c3.high {
                let gap = c1.low - c3.high;
                found.push(PatternRecord::Fvg {
                    kind: PatternSide::Bullish,
                    start: c3.high,
                    end: c1.low,
                    size_in_atr: gap / atr,
                });
            }
        }
        found
    }

    /// A strong candle (body >= 0.5*range and volume >= 1.2x rolling-20
    /// mean) followed by continuation in the same direction (spec.md §4.6).
    fn detect_order_block(&self, window: &[Candle], atr: f64) -> Vec<PatternRecord> {
        let mut found = Vec::new();
        if window.len() < 2 {
            return found;
        }
        let mean_volume = window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64;

        for i in 0..window.len() - 1 {
            let candle = &window[i];
            let next = &window[i + 1];
            let range = candle.high - candle.low;
            if range <= 0.0 {
                continue;
            }
            let body = (candle.close - candle.open).abs();
            let strong_body = body >= OB_BODY_FRACTION * range;
            let strong_volume = mean_volume <= 0.0 || next.volume >= OB_VOLUME_MULT * mean_volume;
            if !strong_body || !strong_volume {
                continue;
            }

            let bullish_block = candle.close < candle.open && next.close > next.open;
            let bearish_block = candle.close > candle.open && next.close < next.open;
            if bullish_block {
                found.push(PatternRecord::OrderBlock {
                    kind: PatternSide::Bullish,
                    reference_price: candle.low,
                    strength_in_atr: range / atr,
                });
            } else if bearish_block {
                found.push(PatternRecord::OrderBlock {
                    kind: PatternSide::Bearish,
                    reference_price: candle.high,
                    strength_in_atr: range / atr,
                });
            }
        }
        found
    }

    /// Current close piercing the trailing-10 swing high/low (spec.md
    /// §4.6). The trailing window excludes the current bar itself.
    fn detect_liquidity_sweep(&self, window: &[Candle], atr: f64) -> Option<PatternRecord> {
        if window.len() < 2 {
            return None;
        }
        let current = window.last()?;
        let lookback = LIQUIDITY_LOOKBACK.min(window.len() - 1);
        let trailing = &window[window.len() - 1 - lookback..window.len() - 1];
        let trailing_high = trailing.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let trailing_low = trailing.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        if current.close > trailing_high {
            return Some(PatternRecord::LiquiditySweep {
                kind: PatternSide::Bearish,
                level: trailing_high,
                distance_in_atr: (current.close - trailing_high) / atr,
            });
        }
        if current.close < trailing_low {
            return Some(PatternRecord::LiquiditySweep {
                kind: PatternSide::Bullish,
                level: trailing_low,
                distance_in_atr: (trailing_low - current.close) / atr,
            });
        }
        None
    }

    /// Current high/low exceeding the prior structural high/low across the
    /// last 5 bars (spec.md §4.6), excluding the current bar.
    fn detect_break_of_structure(&self, window: &[Candle]) -> Option<PatternRecord> {
        if window.len() < 2 {
            return None;
        }
        let current = window.last()?;
        let lookback = BOS_LOOKBACK.min(window.len() - 1);
        let trailing = &window[window.len() - 1 - lookback..window.len() - 1];
        let structural_high = trailing.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let structural_low = trailing.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        if current.high > structural_high {
            return Some(PatternRecord::StructureBreak {
                kind: PatternSide::Bullish,
                level: structural_high,
            });
        }
        if current.low < structural_low {
            return Some(PatternRecord::StructureBreak {
                kind: PatternSide::Bearish,
                level: structural_low,
            });
        }
        None
    }
}

/// Swing points, shared with the indicator engine's ICT derivations
/// (spec.md §4.6's swing-point rule lives in `indicators::ict`, this is a
/// thin re-export so callers needn't reach across modules).
pub fn swing_points(candles: &[Candle]) -> Vec<crate::domain::SwingPoint> {
    crate::indicators::ict::swing_points(candles, SWING_WINDOW)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(ts: i64, o: f64, h: f64, l: f64, cl: f64, v: f64) -> Candle {
        Candle::new(ts, o, h, l, cl, v)
    }

    fn padded(mut window: Vec<Candle>) -> Vec<Candle> {
        let filler: Vec<Candle> = (0..10)
            .map(|i| c(-(i as i64) - 1, 100.0, 101.0, 99.0, 100.0, 50.0))
            .collect();
        let mut out = filler;
        out.reverse();
        out.append(&mut window);
        out
    }

    #[test]
    fn detects_bearish_fvg_from_gap() {
        let detector = PatternDetector::new(14);
        let window = padded(vec![
            c(1, 100.0, 101.0, 99.0, 100.5, 100.0),
            c(2, 100.5, 110.0, 100.0, 109.0, 500.0),
            c(3, 109.0, 112.0, 108.0, 111.0, 200.0),
        ]);
        let records = detector.detect(&window);
        assert!(records.iter().any(|r| matches!(
            r,
            PatternRecord::Fvg { kind: PatternSide::Bearish, .. }
        )));
    }

    #[test]
    fn detects_bullish_order_block_before_displacement() {
        let detector = PatternDetector::new(14);
        let window = padded(vec![
            c(1, 100.0, 100.5, 98.0, 98.5, 40.0),
            c(2, 98.5, 115.0, 98.0, 114.0, 1000.0),
        ]);
        let records = detector.detect(&window);
        assert!(records.iter().any(|r| matches!(
            r,
            PatternRecord::OrderBlock { kind: PatternSide::Bullish, .. }
        )));
    }

    #[test]
    fn detects_liquidity_sweep_above_trailing_high() {
        let detector = PatternDetector::new(14);
        let mut window = padded(vec![]);
        window.push(c(100, 100.0, 103.0, 99.0, 102.0, 50.0));
        let records = detector.detect(&window);
        assert!(records.iter().any(|r| matches!(
            r,
            PatternRecord::LiquiditySweep { kind: PatternSide::Bearish, .. }
        )));
    }

    #[test]
    fn empty_window_yields_no_patterns() {
        let detector = PatternDetector::new(14);
        assert!(detector.detect(&[]).is_empty());
    }
}
