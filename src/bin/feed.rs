//! Feed process entrypoint (spec.md §5): owns the WebSocket/REST
//! connection to the exchange and the Ring Buffer writer, and nothing
//! else. Grounded on the teacher's `src/bin/server.rs` (dotenv, tracing
//! init, fatal `Config::from_env()`, single `#[tokio::main]`).

use aegis_core::config::Config;
use aegis_core::feed::{FeedConfig, FeedRuntime, WebSocketClient};
use aegis_core::ringbuffer::{self, RingBufferWriter};
use anyhow::Context;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("aegis-core feed {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("feed configuration invalid")?;
    info!(symbols = ?config.feed.symbols, ws_url = %config.feed.websocket_url, "configuration loaded");

    let base_dir = ringbuffer::default_base_dir();
    let writer = RingBufferWriter::create(&base_dir).context("failed to create shared-memory ring buffer")?;
    info!(base_dir = %base_dir.display(), "ring buffer created, brain process can now attach");

    let client = WebSocketClient::new(config.feed.websocket_url.clone());
    let runtime_config = FeedConfig {
        symbols: config.feed.symbols.clone(),
        flush_interval: Duration::from_millis(config.feed.flush_interval_ms),
    };

    FeedRuntime::new(client, runtime_config, writer).run().await
}
