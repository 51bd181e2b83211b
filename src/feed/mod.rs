//! C4 — Feed Runtime (spec.md §4.4).
//!
//! Grounded on `src/infrastructure/binance/websocket.rs`'s reconnect loop
//! (exponential backoff, a channel-fed writer task so pings and data share
//! one sink, URL-vs-JSON subscription strategy), narrowed to this crate's
//! conflate-then-flush-on-cadence contract instead of the teacher's
//! straight-through broadcast of every trade.

mod client;
mod conflate;
mod rest;

pub use client::{ExchangeClient, ExchangeEvent, WebSocketClient};
pub use conflate::Conflator;
pub use rest::RestClient;

use crate::domain::{Candle, RawTick};
use crate::firewall::Firewall;
use crate::ringbuffer::RingBufferWriter;
use crate::ringbuffer::SymbolTable;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::warn;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct FeedConfig {
    pub symbols: Vec<String>,
    pub flush_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Drives one exchange client end-to-end: connect (with reconnect/backoff
/// handled inside the client), firewall every tick, conflate by symbol,
/// flush to the ring buffer on a fixed cadence (spec.md §4.4).
pub struct FeedRuntime<C: ExchangeClient> {
    client: C,
    config: FeedConfig,
    firewall: Firewall,
    writer: RingBufferWriter,
    symbol_table: SymbolTable,
}

impl<C: ExchangeClient> FeedRuntime<C> {
    pub fn new(client: C, config: FeedConfig, writer: RingBufferWriter) -> Self {
        let symbol_table = SymbolTable::new(&config.symbols);
        Self {
            client,
            config,
            firewall: Firewall::new(),
            writer,
            symbol_table,
        }
    }

    /// Runs forever. The writer never blocks (spec.md §4.4 "Back-pressure on
    /// the Ring Buffer is impossible"); overflow is strictly the reader's
    /// concern, handled on the Brain side.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let (tick_tx, mut tick_rx) = mpsc::channel::<(String, RawTick)>(4096);
        self.client.connect(self.config.symbols.clone(), tick_tx).await?;

        let mut conflator: Conflator = Conflator::new();
        let mut flush_timer = tokio::time::interval(self.config.flush_interval);
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_tick = tick_rx.recv() => {
                    match maybe_tick {
                        Some((symbol, raw)) => {
                            match self.firewall.validate(&raw) {
                                Ok(candle) => conflator.offer(symbol, candle),
                                Err(_) => {} // poison_pill already logged by the firewall
                            }
                        }
                        None => {
                            warn!("feed client channel closed, stopping feed runtime");
                            return Ok(());
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    self.flush(&mut conflator);
                }
            }
        }
    }

    fn flush(&mut self, conflator: &mut Conflator) {
        for (symbol, candle) in conflator.drain() {
            let symbol_id = self.symbol_table.intern(&symbol);
            self.writer.write(&candle, symbol_id);
        }
    }
}

/// Stand-in exchange client used only by tests: accepts ticks pushed onto a
/// channel rather than speaking a real protocol.
#[allow(dead_code)]
pub fn stub_ticks(symbols: &[&str], candles_per_symbol: &HashMap<String, Vec<Candle>>) -> Vec<(String, RawTick)> {
    let mut out = Vec::new();
    for symbol in symbols {
        if let Some(candles) = candles_per_symbol.get(*symbol) {
            for candle in candles {
                out.push((symbol.to_string(), candle.to_tick()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    #[test]
    fn conflator_keeps_latest_per_symbol() {
        let mut conflator = Conflator::new();
        conflator.offer("BTCUSDT".to_string(), Candle::new(1, 100.0, 101.0, 99.0, 100.0, 1.0));
        conflator.offer("BTCUSDT".to_string(), Candle::new(2, 101.0, 102.0, 100.0, 101.5, 1.0));
        conflator.offer("ETHUSDT".to_string(), Candle::new(1, 10.0, 11.0, 9.0, 10.0, 1.0));

        let drained: HashMap<String, Candle> = conflator.drain().into_iter().collect();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained["BTCUSDT"].ts_ms, 2);
    }
}
