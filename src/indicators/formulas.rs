//! Indicator arithmetic, hand-rolled per spec.md §4.5 (see `SPEC_FULL.md`
//! for why the `ta` crate's streaming objects don't fit the window-based,
//! cache-driven contract this engine needs).

use crate::domain::Candle;

/// `alpha = 2 / (period + 1)`, the standard EMA smoothing constant.
pub fn ema_alpha(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// One forward step of the EMA recurrence: `EMA_t = alpha*price_t +
/// (1-alpha)*EMA_{t-1}` (spec.md §4.5).
pub fn ema_step(prev_ema: f64, price: f64, period: usize) -> f64 {
    let alpha = ema_alpha(period);
    alpha * price + (1.0 - alpha) * prev_ema
}

/// Full EMA series over `prices`, seeded with the first price as the
/// initial EMA value (the conventional seatless-SMA-free seed). Returns one
/// value per input price — same length as input (spec.md §4.5 "Output: a
/// series (same length as input)").
pub fn ema_full(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(prices.len());
    let mut ema = prices[0];
    out.push(ema);
    for &price in &prices[1..] {
        ema = ema_step(ema, price, period);
        out.push(ema);
    }
    out
}

pub fn sma(prices: &[f64], period: usize) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let period = period.min(prices.len());
    let window = &prices[prices.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

/// Wilder-style RSI over the full `prices` series, period degraded to
/// `prices.len() - 1` when too short. Returns the final scalar (spec.md
/// §4.5 "fall back to full recompute").
pub fn rsi(prices: &[f64], period: usize) -> (f64, usize) {
    if prices.len() < 2 {
        return (50.0, prices.len());
    }
    let used_period = period.min(prices.len() - 1);
    let mut gains = 0.0;
    let mut losses = 0.0;
    let start = prices.len() - used_period - 1;
    for i in start + 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += -change;
        }
    }
    let avg_gain = gains / used_period as f64;
    let avg_loss = losses / used_period as f64;
    if avg_loss == 0.0 {
        return (100.0, used_period);
    }
    let rs = avg_gain / avg_loss;
    let rsi_value = 100.0 - 100.0 / (1.0 + rs);
    (rsi_value, used_period)
}

#[derive(Debug, Clone, Copy)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD computed from two full EMA recomputations (fast - slow), with the
/// signal line as an EMA of the macd series. Falls back to full recompute
/// every call per spec.md §4.5.
pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    if prices.is_empty() {
        return Macd {
            macd: 0.0,
            signal: 0.0,
            histogram: 0.0,
        };
    }
    let fast_ema = ema_full(prices, fast);
    let slow_ema = ema_full(prices, slow);
    let macd_series: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_series = ema_full(&macd_series, signal);
    let macd_value = *macd_series.last().unwrap();
    let signal_value = *signal_series.last().unwrap();
    Macd {
        macd: macd_value,
        signal: signal_value,
        histogram: macd_value - signal_value,
    }
}

/// True range for bar `i` against the previous close (bar 0 uses high-low
/// only, no previous close to compare against).
pub fn true_range(candles: &[Candle], i: usize) -> f64 {
    let c = &candles[i];
    let hl = c.high - c.low;
    if i == 0 {
        return hl;
    }
    let prev_close = candles[i - 1].close;
    let hc = (c.high - prev_close).abs();
    let lc = (c.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Wilder-smoothed ATR, period degraded when the window is too short
/// (spec.md §4.5).
pub fn atr(candles: &[Candle], period: usize) -> (f64, usize) {
    if candles.is_empty() {
        return (0.0, 0);
    }
    let used_period = period.min(candles.len());
    let trs: Vec<f64> = (0..candles.len()).map(|i| true_range(candles, i)).collect();
    let mut value = trs[..used_period].iter().sum::<f64>() / used_period as f64;
    let alpha = 1.0 / used_period as f64;
    for &tr in &trs[used_period..] {
        value = alpha * tr + (1.0 - alpha) * value;
    }
    (value, used_period)
}

#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn bollinger_bands(prices: &[f64], period: usize, std_dev_mult: f64) -> BollingerBands {
    let used_period = period.min(prices.len().max(1));
    let middle = sma(prices, used_period);
    if prices.is_empty() {
        return BollingerBands {
            upper: 0.0,
            middle: 0.0,
            lower: 0.0,
        };
    }
    let window = &prices[prices.len().saturating_sub(used_period)..];
    let variance =
        window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / used_period as f64;
    let std_dev = variance.sqrt();
    BollingerBands {
        upper: middle + std_dev_mult * std_dev,
        middle,
        lower: middle - std_dev_mult * std_dev,
    }
}

/// Wilder-smoothed ADX with canonical +DM/-DM definitions (spec.md §4.5):
/// `+DM = max(0, high_t - high_{t-1})` when that exceeds `low_{t-1} -
/// low_t`, symmetrically for `-DM`.
pub fn adx(candles: &[Candle], period: usize) -> (f64, usize) {
    if candles.len() < 2 {
        return (0.0, candles.len());
    }
    let used_period = period.min(candles.len() - 1);
    let alpha = 1.0 / used_period as f64;

    let mut plus_dm_smoothed = 0.0;
    let mut minus_dm_smoothed = 0.0;
    let mut tr_smoothed = 0.0;
    let mut dx_values = Vec::new();

    for i in 1..candles.len() {
        let up_move = candles[i].high - candles[i - 1].high;
        let down_move = candles[i - 1].low - candles[i].low;
        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };
        let tr = true_range(candles, i);

        if i == 1 {
            plus_dm_smoothed = plus_dm;
            minus_dm_smoothed = minus_dm;
            tr_smoothed = tr;
        } else {
            plus_dm_smoothed = plus_dm_smoothed * (1.0 - alpha) + plus_dm * alpha;
            minus_dm_smoothed = minus_dm_smoothed * (1.0 - alpha) + minus_dm * alpha;
            tr_smoothed = tr_smoothed * (1.0 - alpha) + tr * alpha;
        }

        if tr_smoothed > 0.0 {
            let plus_di = 100.0 * plus_dm_smoothed / tr_smoothed;
            let minus_di = 100.0 * minus_dm_smoothed / tr_smoothed;
            let di_sum = plus_di + minus_di;
            let dx = if di_sum > 0.0 {
                100.0 * (plus_di - minus_di).abs() / di_sum
            } else {
                0.0
            };
            dx_values.push(dx);
        }
    }

    if dx_values.is_empty() {
        return (0.0, used_period);
    }
    let adx_value = dx_values.iter().sum::<f64>() / dx_values.len() as f64;
    (adx_value, used_period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_period_one_returns_input_unchanged() {
        let prices = vec![1.0, 2.0, 3.0, 4.0];
        let result = ema_full(&prices, 1);
        assert_eq!(result, prices);
    }

    #[test]
    fn ema_step_matches_full_recompute_one_bar_further() {
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        let full = ema_full(&prices, 5);
        let mut extended = prices.clone();
        extended.push(15.0);
        let full_extended = ema_full(&extended, 5);

        let incremental = ema_step(*full.last().unwrap(), 15.0, 5);
        assert!((incremental - *full_extended.last().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn rsi_of_monotonically_rising_series_is_above_70() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 2.0).collect();
        let (value, _) = rsi(&prices, 14);
        assert!(value > 70.0, "expected RSI > 70, got {value}");
    }

    #[test]
    fn atr_degrades_period_on_short_window() {
        let candles: Vec<Candle> = (0..5)
            .map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 10.0))
            .collect();
        let (_, used) = atr(&candles, 14);
        assert_eq!(used, 5);
    }
}
