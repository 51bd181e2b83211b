//! Exchange WebSocket client (spec.md §4.4, §6).
//!
//! Grounded on `src/infrastructure/binance/websocket.rs`'s
//! `BinanceWebSocketManager`: a reconnect loop with exponential backoff, a
//! channel-fed writer task so pings and subscribe frames share one sink,
//! and a URL-params-vs-JSON-RPC subscription strategy keyed off symbol
//! count. Narrowed to this crate's single concern — push raw ticks onto a
//! channel — everything downstream of that (conflation, firewall,
//! flush-to-ring-buffer cadence) lives in [`crate::feed::FeedRuntime`].

use crate::domain::candle::{RawTick, TickValue};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const PING_INTERVAL: Duration = Duration::from_secs(20);
const SUBSCRIBE_BATCH_SIZE: usize = 10;
const URL_PARAM_SYMBOL_LIMIT: usize = 50;

/// Emitted by a client implementation as ticks arrive. The runtime only
/// needs the symbol and the raw fields; everything else is the Firewall's
/// job (spec.md §4.3).
#[derive(Debug, Clone)]
pub enum ExchangeEvent {
    Tick { symbol: String, tick: RawTick },
}

/// Anything that can stream ticks for a symbol set onto a channel,
/// reconnecting on its own for as long as the process runs. `connect`
/// returns once the background task is spawned; it does not block for the
/// lifetime of the stream (spec.md §4.4's Feed Runtime owns the foreground
/// loop).
#[async_trait]
pub trait ExchangeClient: Send + 'static {
    async fn connect(&mut self, symbols: Vec<String>, tick_tx: mpsc::Sender<(String, RawTick)>) -> anyhow::Result<()>;
}

/// WebSocket client speaking a Binance-shaped combined-stream protocol
/// (spec.md §6 "Exchange WebSocket (consumed)"). Reconnects forever with
/// exponential backoff (1s doubling to a 30s ceiling) plus jitter, and
/// re-subscribes from scratch on every reconnect.
pub struct WebSocketClient {
    ws_url: String,
}

impl WebSocketClient {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }

    async fn run(ws_url: String, symbols: Vec<String>, tick_tx: mpsc::Sender<(String, RawTick)>) {
        let mut backoff = Duration::from_secs(1);
        loop {
            match Self::connect_and_stream(&ws_url, &symbols, &tick_tx).await {
                Ok(()) => {
                    info!("exchange websocket closed gracefully, reconnecting");
                    backoff = Duration::from_secs(1);
                }
                Err(error) => {
                    let jitter = Duration::from_millis(rand::rng().random_range(0..250));
                    error!(%error, backoff_ms = backoff.as_millis() as u64, "exchange websocket error, reconnecting");
                    tokio::time::sleep(backoff + jitter).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
            if tick_tx.is_closed() {
                warn!("tick channel closed, stopping exchange client");
                return;
            }
        }
    }

    async fn connect_and_stream(
        ws_url: &str,
        symbols: &[String],
        tick_tx: &mpsc::Sender<(String, RawTick)>,
    ) -> anyhow::Result<()> {
        if symbols.is_empty() {
            tokio::time::sleep(Duration::from_secs(5)).await;
            return Ok(());
        }

        let use_url_params = symbols.len() < URL_PARAM_SYMBOL_LIMIT;
        let streams: Vec<String> = symbols.iter().map(|s| format!("{}@kline_1m", s.to_lowercase())).collect();

        let mut url = format!("{}/stream", ws_url.trim_end_matches('/'));
        if use_url_params {
            url.push_str("?streams=");
            url.push_str(&streams.join("/"));
        }

        info!(%url, "connecting to exchange websocket");
        let (ws_stream, _) = connect_async(&url).await?;
        let (write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(128);
        let mut write = write;
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        if !use_url_params {
            for chunk in streams.chunks(SUBSCRIBE_BATCH_SIZE) {
                let subscribe = serde_json::json!({
                    "method": "SUBSCRIBE",
                    "params": chunk,
                    "id": chunk.len(),
                });
                if out_tx.send(Message::Text(subscribe.to_string().into())).await.is_err() {
                    anyhow::bail!("failed to send subscribe frame");
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        }

        let ping_tx = out_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PING_INTERVAL);
            loop {
                interval.tick().await;
                if ping_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Err(error) = Self::handle_text(&text, tick_tx).await {
                        debug!(%error, "unhandled exchange websocket frame");
                    }
                }
                Ok(Message::Ping(_)) => {
                    let _ = out_tx.send(Message::Pong(Vec::new().into())).await;
                }
                Ok(Message::Close(frame)) => {
                    info!(?frame, "exchange websocket closed by server");
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    anyhow::bail!("exchange websocket read error: {error}");
                }
            }
        }
        Ok(())
    }

    async fn handle_text(text: &str, tick_tx: &mpsc::Sender<(String, RawTick)>) -> anyhow::Result<()> {
        #[derive(Deserialize)]
        struct StreamMessage {
            stream: String,
            data: serde_json::Value,
        }
        #[derive(Deserialize)]
        struct KlinePayload {
            k: KlineBody,
        }
        #[derive(Deserialize)]
        struct KlineBody {
            #[serde(rename = "t")]
            open_time: i64,
            #[serde(rename = "o")]
            open: String,
            #[serde(rename = "h")]
            high: String,
            #[serde(rename = "l")]
            low: String,
            #[serde(rename = "c")]
            close: String,
            #[serde(rename = "v")]
            volume: String,
        }

        let msg: StreamMessage = serde_json::from_str(text)?;
        if !msg.stream.ends_with("@kline_1m") {
            return Ok(());
        }
        let symbol = msg
            .stream
            .strip_suffix("@kline_1m")
            .unwrap_or(&msg.stream)
            .to_uppercase();
        let payload: KlinePayload = serde_json::from_value(msg.data)?;

        let tick = RawTick::new()
            .set("t", payload.k.open_time as f64)
            .set("o", TickValue::Text(payload.k.open))
            .set("h", TickValue::Text(payload.k.high))
            .set("l", TickValue::Text(payload.k.low))
            .set("c", TickValue::Text(payload.k.close))
            .set("v", TickValue::Text(payload.k.volume));

        let _ = tick_tx.send((symbol, tick)).await;
        Ok(())
    }
}

#[async_trait]
impl ExchangeClient for WebSocketClient {
    async fn connect(&mut self, symbols: Vec<String>, tick_tx: mpsc::Sender<(String, RawTick)>) -> anyhow::Result<()> {
        let ws_url = self.ws_url.clone();
        tokio::spawn(Self::run(ws_url, symbols, tick_tx));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_spawns_without_blocking() {
        let mut client = WebSocketClient::new("ws://127.0.0.1:1");
        let (tx, _rx) = mpsc::channel(8);
        let result = client.connect(vec!["BTCUSDT".to_string()], tx).await;
        assert!(result.is_ok());
    }
}
