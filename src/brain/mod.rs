//! C9 — Brain Runtime (spec.md §4.9), the main poll/analyze/publish loop.
//!
//! Grounded on `src/application/agents/warmup_service.rs` (REST backfill,
//! gap detection — see [`warmup::WarmupService`]), `src/domain/trading/
//! symbol_context.rs` (per-symbol rolling state — see [`window::SymbolWindow`]),
//! and `src/application/system.rs`'s main-loop shape (poll a source, route
//! through the fixed pipeline, publish) generalized from the teacher's
//! strategy-engine tick to spec.md §4.9 steps 1-7: poll the Ring Buffer,
//! resolve symbol, update the rolling window, gate on minimum length,
//! run Pattern Detector -> Feature Extractor -> Scorer, threshold-check,
//! publish.

pub mod warmup;
pub mod window;

use crate::config::RiskConfig;
use crate::domain::Signal;
use crate::eventbus::{EventBus, EventPayload, Topic};
use crate::features::FeatureExtractor;
use crate::indicators::IndicatorEngine;
use crate::patterns::PatternDetector;
use crate::persistence::ExperienceRecorder;
use crate::ringbuffer::{RingBufferReader, SymbolTable};
use crate::scorer::Scorer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use window::SymbolWindow;

/// Poll cadence for draining the Ring Buffer (spec.md §4.9 step 1). The
/// teacher's main loop polls its strategy-engine tick source on a fixed
/// timer rather than blocking; this core does the same over shared memory
/// since there is no blocking-read primitive across the mmap boundary.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-symbol pipeline state the Brain owns across polls: the candle
/// window, the indicator cache (so EMA/RSI/etc. stay incremental per
/// spec.md §4.5 rather than resetting every poll), and the pattern
/// detector (stateless, but constructed once per symbol to match the
/// ATR period the indicators use).
struct SymbolState {
    window: SymbolWindow,
    indicator_engine: IndicatorEngine,
}

impl SymbolState {
    fn new() -> Self {
        Self {
            window: SymbolWindow::new(),
            indicator_engine: IndicatorEngine::new(),
        }
    }
}

pub struct BrainRuntime {
    reader: RingBufferReader,
    symbol_table: SymbolTable,
    pattern_detector: PatternDetector,
    feature_extractor: FeatureExtractor,
    scorer: Arc<dyn Scorer>,
    event_bus: Arc<EventBus>,
    risk_config: RiskConfig,
    experience_recorder: Option<ExperienceRecorder>,
    symbols: HashMap<String, SymbolState>,
}

impl BrainRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: RingBufferReader,
        symbol_table: SymbolTable,
        atr_period: usize,
        scorer: Arc<dyn Scorer>,
        event_bus: Arc<EventBus>,
        risk_config: RiskConfig,
        experience_recorder: Option<ExperienceRecorder>,
    ) -> Self {
        Self {
            reader,
            symbol_table,
            pattern_detector: PatternDetector::new(atr_period),
            feature_extractor: FeatureExtractor::new(),
            scorer,
            event_bus,
            risk_config,
            experience_recorder,
            symbols: HashMap::new(),
        }
    }

    /// Seeds a symbol's window from historical warm-up candles (spec.md
    /// §4.9 "Warm-up"), called once per symbol at startup before [`Self::run`].
    pub fn seed_warmup(&mut self, symbol: &str, candles: Vec<crate::domain::Candle>) {
        let state = self.symbols.entry(symbol.to_string()).or_insert_with(SymbolState::new);
        for candle in candles {
            state.window.push(candle);
        }
    }

    /// Runs forever: poll, drain, process each new candle (spec.md §4.9
    /// steps 1-7). Never returns under normal operation.
    pub async fn run(&mut self) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            self.poll_once().await;
        }
    }

    /// One poll/drain/process cycle (the body of [`Self::run`]'s loop),
    /// exposed separately so a caller that also has to run a Position
    /// Monitor scheduler tick can drive both off one shared `Mutex`
    /// without duplicating the Ring Buffer drain logic.
    pub async fn poll_once(&mut self) {
        if self.reader.pending() == 0 {
            return;
        }
        let batch = self.reader.read_new();
        for (candle, symbol_id) in batch {
            let Some(symbol) = self.symbol_table.symbol_for(symbol_id).map(str::to_string) else {
                warn!(symbol_id, "brain received a candle for an unknown symbol id, dropping");
                continue;
            };
            self.process_one(&symbol, candle).await;
        }
    }

    /// The most recent window for `symbol`, oldest-first, for a caller
    /// building a [`crate::monitor::PositionSnapshot`]. `None` if the Brain
    /// has never seen a candle for this symbol.
    pub fn window_snapshot(&self, symbol: &str) -> Option<Vec<crate::domain::Candle>> {
        let state = self.symbols.get(symbol)?;
        if state.window.is_empty() {
            None
        } else {
            Some(state.window.as_vec())
        }
    }

    /// The close of the most recent candle for `symbol`, used as the mark
    /// price a scheduler tick snapshots a position at.
    pub fn mark_price(&self, symbol: &str) -> Option<f64> {
        self.symbols.get(symbol)?.window.as_vec().last().map(|c| c.close)
    }

    /// Steps 3-7 of spec.md §4.9 for one symbol/candle pair.
    async fn process_one(&mut self, symbol: &str, candle: crate::domain::Candle) {
        let state = self.symbols.entry(symbol.to_string()).or_insert_with(SymbolState::new);
        state.window.push(candle);

        // Step 5: gate on minimum window length. Warm-up (a shorter window
        // than steady-state) uses the permissive confidence threshold
        // instead of skipping outright, so a freshly-started Brain can
        // still emit signals once it has the bare minimum of history
        // (spec.md §4.9 step 5, resolving Open Question 2 per DESIGN.md).
        let min_warmup = self.risk_config.min_window_warmup();
        let min_steady = self.risk_config.min_window_steady();
        if state.window.len() < min_warmup {
            return;
        }
        let is_warmup = state.window.len() < min_steady;

        let candles = state.window.as_vec();
        let patterns = self.pattern_detector.detect(&candles);
        let features = self.feature_extractor.extract(&candles, &mut state.indicator_engine, &patterns);
        let confidence = self.scorer.predict(&features);

        let threshold = if is_warmup {
            self.risk_config.permissive_confidence_threshold
        } else {
            self.risk_config.min_confidence_for_trade
        };

        if confidence < threshold {
            return;
        }

        let timestamp = state.window.last_timestamp().unwrap_or(0);
        let position_size = self.risk_config.max_trade_risk_fraction;
        let signal = Signal::new(symbol.to_string(), confidence, patterns, position_size, timestamp);

        info!(symbol, confidence, warmup = is_warmup, "brain emitted signal");

        if let Some(recorder) = &mut self.experience_recorder {
            if let Err(error) = recorder.record(&signal, &features).await {
                warn!(symbol, %error, "failed to append experience-buffer record");
            }
        }

        self.event_bus
            .publish(Topic::SignalGenerated, EventPayload::SignalGenerated(signal))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;
    use crate::scorer::HeuristicScorer;

    fn trending_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let price = 100.0 + i as f64 * 0.5;
                Candle::new(i as i64 * 60_000, price, price + 1.0, price - 1.0, price + 0.3, 100.0)
            })
            .collect()
    }

    fn runtime(event_bus: Arc<EventBus>) -> BrainRuntime {
        let dir = std::env::temp_dir().join(format!("aegis_brain_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let _writer = crate::ringbuffer::RingBufferWriter::create(&dir).unwrap();
        let reader = RingBufferReader::attach(&dir).unwrap();
        BrainRuntime::new(
            reader,
            SymbolTable::new(&["BTCUSDT".to_string()]),
            14,
            Arc::new(HeuristicScorer::new()),
            event_bus,
            RiskConfig {
                max_trade_risk_fraction: 0.02,
                min_confidence_for_trade: 0.99,
                permissive_confidence_threshold: 0.0,
                risk_kill_threshold: 0.99,
            },
            None,
        )
    }

    #[tokio::test]
    async fn below_minimum_window_never_emits_a_signal() {
        use crate::eventbus::Listener;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(Arc<AtomicUsize>);
        #[async_trait]
        impl Listener for Counter {
            async fn on_event(&self, _payload: &EventPayload) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Topic::SignalGenerated, Arc::new(Counter(Arc::clone(&count)))).await;

        let mut brain = runtime(Arc::clone(&bus));
        for candle in trending_candles(3) {
            brain.process_one("BTCUSDT", candle).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn warmup_seeded_window_is_available_on_first_process_one_call() {
        let bus = Arc::new(EventBus::new());
        let mut brain = runtime(Arc::clone(&bus));
        brain.seed_warmup("BTCUSDT", trending_candles(25));
        assert_eq!(brain.symbols.get("BTCUSDT").unwrap().window.len(), 25);
    }

    #[tokio::test]
    async fn permissive_threshold_of_zero_always_admits_once_minimum_window_is_reached() {
        use crate::eventbus::Listener;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(Arc<AtomicUsize>);
        #[async_trait]
        impl Listener for Counter {
            async fn on_event(&self, _payload: &EventPayload) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Topic::SignalGenerated, Arc::new(Counter(Arc::clone(&count)))).await;

        let mut brain = runtime(Arc::clone(&bus));
        for candle in trending_candles(10) {
            brain.process_one("BTCUSDT", candle).await;
        }
        assert!(count.load(Ordering::SeqCst) > 0);
    }
}
