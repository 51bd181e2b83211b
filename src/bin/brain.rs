//! Brain process entrypoint (spec.md §5): attaches to the Ring Buffer the
//! Feed process created and hosts every analysis/decision component that
//! follows it — C5 through C12 — as one single-threaded cooperative
//! runtime. Grounded on the teacher's `src/bin/server.rs` for the
//! entrypoint shape; the wiring between components below is new, since
//! spec.md describes each component's behavior but leaves the process
//! main() to the implementation.
//!
//! Two design gaps spec.md leaves to the implementation are resolved
//! here, not in any library module, and recorded in DESIGN.md:
//!
//! - `ORDER_FILLED` carries an `Order`, which has no fill-price field —
//!   the real execution surface that would report one is out of scope
//!   (spec.md §1). This binary takes the Brain's latest mark price for
//!   the symbol as the fill price, same as a market order would expect
//!   to clear close to the last trade.
//! - The Position Monitor "receives a snapshot of open positions at each
//!   scheduler tick" (spec.md §4.11) without naming which component owns
//!   that scheduler. Here it is a plain `tokio::time::interval` loop that
//!   reads the Account and the Brain's per-symbol windows and calls
//!   `PositionMonitor::tick`.

use aegis_core::account::{Account, FillEvent};
use aegis_core::brain::warmup::WarmupService;
use aegis_core::brain::BrainRuntime;
use aegis_core::config::Config;
use aegis_core::domain::{OrderSide, Signal};
use aegis_core::eventbus::{EventBus, EventPayload, Listener, Topic};
use aegis_core::feed::RestClient;
use aegis_core::monitor::{PositionMonitor, PositionSnapshot};
use aegis_core::persistence::{ExperienceRecorder, TradeRecorder};
use aegis_core::ringbuffer::{self, RingBufferReader, SymbolTable};
use aegis_core::risk::RiskGate;
use aegis_core::scorer::{HeuristicScorer, ModelScorer, Scorer};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn, Level};
use tracing_subscriber::prelude::*;

const WARMUP_INTERVAL: &str = "1m";
const WARMUP_BAR_MS: i64 = 60_000;

/// Starting balance for the in-process [`Account`]. Not one of the five
/// configuration concerns `Config` aggregates (spec.md §6 treats the
/// starting balance as an operator-supplied deployment parameter, not a
/// tunable of any single component), so it is read directly here.
fn starting_balance() -> f64 {
    std::env::var("AEGIS_STARTING_BALANCE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10_000.0)
}

/// Stashes the most recently admitted signal per symbol, so that when
/// `ORDER_FILLED` arrives later for that symbol, the opening signal can be
/// handed to [`PositionMonitor::record_opening_signal`] (spec.md §4.11
/// step 3). Subscribed to `SIGNAL_GENERATED` ahead of the [`RiskGate`] so
/// the stash is always populated before the corresponding `ORDER_REQUEST`
/// can be published.
struct SignalStash {
    by_symbol: Mutex<HashMap<String, Signal>>,
}

impl SignalStash {
    fn new() -> Self {
        Self {
            by_symbol: Mutex::new(HashMap::new()),
        }
    }

    async fn take(&self, symbol: &str) -> Option<Signal> {
        self.by_symbol.lock().await.remove(symbol)
    }
}

#[async_trait]
impl Listener for SignalStash {
    async fn on_event(&self, payload: &EventPayload) {
        if let EventPayload::SignalGenerated(signal) = payload {
            self.by_symbol.lock().await.insert(signal.symbol.clone(), signal.clone());
        }
    }
}

/// Applies `ORDER_FILLED` to the [`Account`], persists the resulting
/// trade, and keeps the [`PositionMonitor`] and [`RiskGate`] in sync with
/// which positions are open (spec.md §4.12 "no other state mutation path
/// exists" and §4.11 step 3).
struct OrderFilledListener {
    account: Arc<Account>,
    risk_gate: Arc<RiskGate>,
    monitor: Arc<PositionMonitor>,
    signal_stash: Arc<SignalStash>,
    brain: Arc<Mutex<BrainRuntime>>,
    trade_recorder: Mutex<TradeRecorder>,
}

#[async_trait]
impl Listener for OrderFilledListener {
    async fn on_event(&self, payload: &EventPayload) {
        let EventPayload::OrderFilled(order) = payload else {
            return;
        };

        let Some(price) = self.brain.lock().await.mark_price(&order.symbol) else {
            warn!(symbol = %order.symbol, "order filled for a symbol the brain has no mark price for, dropping fill");
            return;
        };

        let was_open = self.account.has_open_position(&order.symbol).await;
        let fill = FillEvent {
            symbol: order.symbol.clone(),
            side: order.side,
            price,
            quantity: order.quantity,
            timestamp: order.timestamp,
        };

        if let Err(error) = self.account.apply_fill(fill).await {
            error!(symbol = %order.symbol, %error, "failed to apply order fill to account state");
            return;
        }

        let snapshot = self.account.snapshot().await;
        if let Some(trade) = snapshot.trades.last() {
            let mut recorder = self.trade_recorder.lock().await;
            if let Err(error) = recorder.record(trade).await {
                warn!(%error, "failed to append trade record");
            }
        }

        let is_open_now = self.account.has_open_position(&order.symbol).await;
        if is_open_now && !was_open {
            if let Some(signal) = self.signal_stash.take(&order.symbol).await {
                self.monitor.record_opening_signal(&order.symbol, signal, price).await;
            }
        } else if !is_open_now && was_open {
            self.monitor.forget_position(&order.symbol).await;
            self.risk_gate.release_symbol(&order.symbol).await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("aegis-core brain {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("brain configuration invalid")?;

    let base_dir = ringbuffer::default_base_dir();
    let reader = RingBufferReader::attach(&base_dir)
        .context("failed to attach to shared-memory ring buffer; is the feed process running?")?;
    let symbol_table = SymbolTable::new(&config.feed.symbols);

    let event_bus = Arc::new(EventBus::new());
    let account = Arc::new(Account::new(starting_balance()));

    let scorer: Arc<dyn Scorer> = match std::env::var("AEGIS_CONFIDENCE_MODEL_PATH") {
        Ok(path) => Arc::new(ModelScorer::load(path)),
        Err(_) => Arc::new(HeuristicScorer::new()),
    };

    let trade_recorder = TradeRecorder::open(
        &config.observability.trade_log_path,
        config.observability.rotation_threshold_bytes,
        config.observability.gzip_rotated_files,
    )
    .await
    .context("failed to open trade log")?;

    let experience_recorder = ExperienceRecorder::open(
        &config.observability.experience_log_path,
        config.observability.rotation_threshold_bytes,
        config.observability.gzip_rotated_files,
    )
    .await
    .context("failed to open experience log")?;

    let risk_gate = Arc::new(RiskGate::new(Arc::clone(&account), Arc::clone(&event_bus), config.risk.clone()));
    let monitor = Arc::new(PositionMonitor::new(
        Arc::clone(&scorer),
        config.monitor.clone(),
        config.risk.risk_kill_threshold,
    ));
    let signal_stash = Arc::new(SignalStash::new());

    let mut brain = BrainRuntime::new(
        reader,
        symbol_table,
        config.indicators.atr_period,
        Arc::clone(&scorer),
        Arc::clone(&event_bus),
        config.risk.clone(),
        Some(experience_recorder),
    );
    warm_up_symbols(&mut brain, &config).await;
    let brain = Arc::new(Mutex::new(brain));

    // Registration order matters: the stash must see SIGNAL_GENERATED
    // before the Risk Gate admits it onto ORDER_REQUEST (spec.md §4.2
    // "registration-order delivery").
    event_bus.subscribe(Topic::SignalGenerated, signal_stash.clone()).await;
    event_bus.subscribe(Topic::SignalGenerated, risk_gate.clone()).await;
    event_bus
        .subscribe(
            Topic::OrderFilled,
            Arc::new(OrderFilledListener {
                account: Arc::clone(&account),
                risk_gate: Arc::clone(&risk_gate),
                monitor: Arc::clone(&monitor),
                signal_stash: Arc::clone(&signal_stash),
                brain: Arc::clone(&brain),
                trade_recorder: Mutex::new(trade_recorder),
            }),
        )
        .await;

    let monitor_task = tokio::spawn(run_monitor_loop(
        Arc::clone(&monitor),
        Arc::clone(&account),
        Arc::clone(&event_bus),
        Arc::clone(&brain),
        config.monitor.tick_interval_ms,
    ));

    let brain_loop = Arc::clone(&brain);
    let brain_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(50));
        loop {
            interval.tick().await;
            brain_loop.lock().await.poll_once().await;
        }
    });

    tokio::select! {
        result = brain_task => { result.context("brain poll loop panicked")?; }
        result = monitor_task => { result.context("position monitor loop panicked")?; }
    }

    Ok(())
}

/// Fetches historical candles for every configured symbol via REST and
/// seeds the Brain's per-symbol window before the live poll loop starts
/// (spec.md §4.9 "Warm-up"). Fetch failures degrade to an empty window
/// rather than blocking startup — [`WarmupService`] already logs them.
async fn warm_up_symbols(brain: &mut BrainRuntime, config: &Config) {
    let rest = RestClient::new(config.feed.rest_url.clone());
    let warmup = WarmupService::new(&rest);
    let limit = config.risk.min_window_steady().max(1) as u32;

    for symbol in &config.feed.symbols {
        let candles = warmup.warm_up(symbol, WARMUP_INTERVAL, WARMUP_BAR_MS, limit).await;
        info!(symbol, bars = candles.len(), "warm-up complete");
        brain.seed_warmup(symbol, candles);
    }
}

/// Scheduler loop driving [`PositionMonitor::tick`] (spec.md §4.11). Reads
/// the Account for open positions and the Brain's per-symbol windows for
/// the mark price and re-scoring context, then publishes `ORDER_REQUEST`
/// for any resulting forced close.
async fn run_monitor_loop(
    monitor: Arc<PositionMonitor>,
    account: Arc<Account>,
    event_bus: Arc<EventBus>,
    brain: Arc<Mutex<BrainRuntime>>,
    tick_interval_ms: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_interval_ms));
    loop {
        interval.tick().await;

        let snapshot = account.snapshot().await;
        let mut snapshots = Vec::new();
        {
            let brain = brain.lock().await;
            for (symbol, position) in snapshot.positions.iter() {
                if position.quantity == 0.0 {
                    continue;
                }
                let Some(window) = brain.window_snapshot(symbol) else {
                    continue;
                };
                let Some(mark_price) = brain.mark_price(symbol) else {
                    continue;
                };
                let now = window.last().map(|c| c.ts_ms).unwrap_or(0);
                snapshots.push(PositionSnapshot {
                    symbol: symbol.clone(),
                    side: if position.quantity > 0.0 { OrderSide::Buy } else { OrderSide::Sell },
                    quantity: position.quantity.abs(),
                    entry_price: position.average_price,
                    entry_time: now,
                    initial_risk_amount: position.average_price * position.quantity.abs(),
                    mark_price,
                    now,
                    window,
                });
            }
        }

        if snapshots.is_empty() {
            continue;
        }

        let orders = monitor.tick(snapshots).await;
        for order in orders {
            info!(symbol = %order.symbol, "position monitor forced a close, publishing order request");
            event_bus.publish(Topic::OrderRequest, EventPayload::OrderRequest(order)).await;
        }
    }
}
