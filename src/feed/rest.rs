//! Exchange REST client (spec.md §6 "Exchange REST (consumed)").
//!
//! Grounded on `src/infrastructure/binance/market_data.rs`'s
//! `fetch_historical_bars_internal` (klines fetch and parse) and
//! `get_tradable_assets` (exchangeInfo fetch), narrowed to exactly the two
//! calls this core needs: historical klines for Brain warm-up
//! ([`crate::brain`]) and symbol filters exposed downstream as
//! [`SymbolSpec`].

use crate::domain::{Candle, SymbolSpec};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RestClient {
    base_url: String,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("reqwest client construction"),
        }
    }

    /// `GET klines(symbol, interval, limit)` (spec.md §6). Returns an
    /// ordered list of 12-tuples; only fields 0-5 (`open_time, open, high,
    /// low, close, volume`) are interpreted, the rest are ignored.
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> anyhow::Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("klines fetch failed for {symbol}: {body}");
        }

        let rows: Vec<serde_json::Value> = response.json().await?;
        let candles: Vec<Candle> = rows
            .into_iter()
            .filter_map(|row| {
                let arr = row.as_array()?;
                if arr.len() < 6 {
                    return None;
                }
                let ts_ms = arr[0].as_i64()?;
                let open = parse_field(&arr[1])?;
                let high = parse_field(&arr[2])?;
                let low = parse_field(&arr[3])?;
                let close = parse_field(&arr[4])?;
                let volume = parse_field(&arr[5])?;
                Some(Candle::new(ts_ms, open, high, low, close, volume))
            })
            .collect();

        info!(symbol, count = candles.len(), "fetched historical klines");
        Ok(candles)
    }

    /// Like [`RestClient::get_klines`] but bounded to `[start_ms, end_ms)`,
    /// used by the Brain's gap back-fill (spec.md §4.9 "gap detection over
    /// timestamp diffs MUST back-fill any gap > one bar").
    pub async fn get_klines_range(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("interval", interval.to_string()),
                ("startTime", start_ms.to_string()),
                ("endTime", end_ms.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("ranged klines fetch failed for {symbol}: {body}");
        }

        let rows: Vec<serde_json::Value> = response.json().await?;
        let candles: Vec<Candle> = rows
            .into_iter()
            .filter_map(|row| {
                let arr = row.as_array()?;
                if arr.len() < 6 {
                    return None;
                }
                let ts_ms = arr[0].as_i64()?;
                let open = parse_field(&arr[1])?;
                let high = parse_field(&arr[2])?;
                let low = parse_field(&arr[3])?;
                let close = parse_field(&arr[4])?;
                let volume = parse_field(&arr[5])?;
                Some(Candle::new(ts_ms, open, high, low, close, volume))
            })
            .collect();
        Ok(candles)
    }

    /// `exchangeInfo` (spec.md §6), narrowed to the three filters
    /// downstream position sizing needs: `LOT_SIZE`, `MIN_NOTIONAL`,
    /// `PRICE_FILTER`.
    pub async fn get_symbol_specs(&self) -> anyhow::Result<HashMap<String, SymbolSpec>> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("exchangeInfo fetch failed: {body}");
        }

        #[derive(serde::Deserialize)]
        struct Filter {
            #[serde(rename = "filterType")]
            filter_type: String,
            #[serde(rename = "minQty")]
            min_qty: Option<String>,
            #[serde(rename = "stepSize")]
            step_size: Option<String>,
            #[serde(rename = "minNotional")]
            min_notional: Option<String>,
            #[serde(rename = "tickSize")]
            tick_size: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct SymbolInfo {
            symbol: String,
            status: String,
            filters: Vec<Filter>,
        }
        #[derive(serde::Deserialize)]
        struct ExchangeInfo {
            symbols: Vec<SymbolInfo>,
        }

        let info: ExchangeInfo = response.json().await?;
        let mut specs = HashMap::new();
        for symbol in info.symbols {
            if symbol.status != "TRADING" {
                continue;
            }
            let mut spec = SymbolSpec {
                min_qty: 0.0,
                step_size: 0.0,
                min_notional: 0.0,
                tick_size: 0.0,
            };
            for filter in &symbol.filters {
                match filter.filter_type.as_str() {
                    "LOT_SIZE" => {
                        spec.min_qty = filter.min_qty.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                        spec.step_size = filter.step_size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                    }
                    "MIN_NOTIONAL" | "NOTIONAL" => {
                        spec.min_notional = filter.min_notional.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                    }
                    "PRICE_FILTER" => {
                        spec.tick_size = filter.tick_size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                    }
                    _ => {}
                }
            }
            specs.insert(symbol.symbol, spec);
        }
        if specs.is_empty() {
            warn!("exchangeInfo returned no tradable symbols");
        }
        Ok(specs)
    }
}

fn parse_field(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_accepts_both_string_and_number() {
        assert_eq!(parse_field(&serde_json::json!("1.5")), Some(1.5));
        assert_eq!(parse_field(&serde_json::json!(1.5)), Some(1.5));
        assert_eq!(parse_field(&serde_json::json!(null)), None);
    }
}
