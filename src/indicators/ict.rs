//! ICT-specific derivations layered on top of the plain formulas in
//! `formulas.rs` (spec.md §4.5: "EMA slope, swing points, order-block
//! candidates, and a market-structure label"). Shared with `patterns` so
//! swing-point detection exists in exactly one place.

use crate::domain::{Candle, SwingPoint};

/// Slope of the EMA series over its trailing `lookback` bars, expressed as
/// price-units-per-bar (a simple linear difference, not a regression — the
/// teacher's `market_regime.rs` uses the same cheap slope-over-window
/// shortcut for its trend classification).
pub fn ema_slope(ema_series: &[f64], lookback: usize) -> f64 {
    if ema_series.len() < 2 {
        return 0.0;
    }
    let lookback = lookback.min(ema_series.len() - 1).max(1);
    let recent = ema_series[ema_series.len() - 1];
    let past = ema_series[ema_series.len() - 1 - lookback];
    (recent - past) / lookback as f64
}

/// Swing-point detection (spec.md §4.6): in a `window`-wide lookback on
/// each side, a bar is a swing high iff its high exceeds a bar on at least
/// `ceil(window/2)` of the bars on its left AND at least `ceil(window/2)`
/// of the bars on its right — not a strict local max, a fractional
/// majority. This tolerates trending data where a strict fractal test
/// would never fire. Symmetric for swing lows.
pub fn swing_points(candles: &[Candle], window: usize) -> Vec<SwingPoint> {
    let mut points = Vec::new();
    if window == 0 || candles.len() < 2 * window + 1 {
        return points;
    }
    let threshold = window.div_ceil(2);
    for i in window..candles.len() - window {
        let high = candles[i].high;
        let low = candles[i].low;

        let left_high_count = candles[i - window..i].iter().filter(|c| high > c.high).count();
        let right_high_count = candles[i + 1..=i + window].iter().filter(|c| high > c.high).count();
        if left_high_count >= threshold && right_high_count >= threshold {
            points.push(SwingPoint {
                index: i,
                price: high,
                is_high: true,
            });
        }

        let left_low_count = candles[i - window..i].iter().filter(|c| low < c.low).count();
        let right_low_count = candles[i + 1..=i + window].iter().filter(|c| low < c.low).count();
        if left_low_count >= threshold && right_low_count >= threshold {
            points.push(SwingPoint {
                index: i,
                price: low,
                is_high: false,
            });
        }
    }
    points
}

/// Coarse market-structure label from the most recent two confirmed swing
/// highs and lows: higher highs + higher lows => uptrend, lower highs +
/// lower lows => downtrend, anything mixed => ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStructure {
    Uptrend,
    Downtrend,
    Ranging,
}

pub fn market_structure(swings: &[SwingPoint]) -> MarketStructure {
    let highs: Vec<&SwingPoint> = swings.iter().filter(|s| s.is_high).collect();
    let lows: Vec<&SwingPoint> = swings.iter().filter(|s| !s.is_high).collect();
    if highs.len() < 2 || lows.len() < 2 {
        return MarketStructure::Ranging;
    }
    let higher_high = highs[highs.len() - 1].price > highs[highs.len() - 2].price;
    let higher_low = lows[lows.len() - 1].price > lows[lows.len() - 2].price;
    let lower_high = highs[highs.len() - 1].price < highs[highs.len() - 2].price;
    let lower_low = lows[lows.len() - 1].price < lows[lows.len() - 2].price;

    if higher_high && higher_low {
        MarketStructure::Uptrend
    } else if lower_high && lower_low {
        MarketStructure::Downtrend
    } else {
        MarketStructure::Ranging
    }
}

/// A candle is an order-block candidate when it's the last opposite-colored
/// candle before a strong displacement move, measured as the move's range
/// exceeding `atr * strength_mult` (spec.md §4.6 shares this primitive with
/// the pattern detector's canonical Order Block output).
pub fn is_displacement(candle: &Candle, atr: f64, strength_mult: f64) -> bool {
    (candle.high - candle.low) > atr * strength_mult
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(ts, o, h, l, c, 100.0)
    }

    #[test]
    fn swing_high_is_detected_at_local_peak() {
        let candles = vec![
            candle(0, 100.0, 101.0, 99.0, 100.0),
            candle(1, 100.0, 102.0, 99.0, 101.0),
            candle(2, 101.0, 110.0, 100.0, 105.0),
            candle(3, 105.0, 106.0, 103.0, 104.0),
            candle(4, 104.0, 105.0, 102.0, 103.0),
        ];
        let swings = swing_points(&candles, 2);
        assert!(swings.iter().any(|s| s.is_high && s.index == 2 && s.price == 110.0));
    }

    #[test]
    fn market_structure_detects_uptrend_from_higher_highs_and_lows() {
        let swings = vec![
            SwingPoint { index: 0, price: 100.0, is_high: true },
            SwingPoint { index: 1, price: 95.0, is_high: false },
            SwingPoint { index: 2, price: 105.0, is_high: true },
            SwingPoint { index: 3, price: 98.0, is_high: false },
        ];
        assert_eq!(market_structure(&swings), MarketStructure::Uptrend);
    }

    #[test]
    fn ema_slope_is_zero_for_flat_series() {
        let series = vec![100.0; 20];
        assert_eq!(ema_slope(&series, 5), 0.0);
    }
}
