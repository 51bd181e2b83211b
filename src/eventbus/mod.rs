//! C2 — in-process topic pub/sub (spec.md §4.2).
//!
//! Grounded directly on `src/infrastructure/event_bus.rs` (async
//! `RwLock<Vec<Arc<dyn _>>>`, registration-order delivery, one failing
//! subscriber must not block later ones), generalized from the teacher's
//! single `TradingEvent` enum to spec's four named topics.
//!
//! No delivery guarantees across process boundaries — the bus is
//! intentionally single-process (spec.md §4.2). There is no cross-topic
//! ordering guarantee (spec.md §5); each topic has its own listener list.

use crate::domain::{Candle, Order, Signal};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    TickUpdate,
    SignalGenerated,
    OrderRequest,
    OrderFilled,
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    TickUpdate { symbol: String, candle: Candle },
    SignalGenerated(Signal),
    OrderRequest(Order),
    OrderFilled(Order),
}

/// A subscriber. Implementations that are purely synchronous still
/// implement this async trait — the bus awaits every subscriber, sync or
/// async, uniformly (spec.md §4.2: "awaiting asynchronous ones and calling
/// synchronous ones inline").
#[async_trait]
pub trait Listener: Send + Sync {
    async fn on_event(&self, payload: &EventPayload);
}

pub struct EventBus {
    listeners: RwLock<HashMap<Topic, Vec<Arc<dyn Listener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    pub async fn subscribe(&self, topic: Topic, listener: Arc<dyn Listener>) {
        self.listeners
            .write()
            .await
            .entry(topic)
            .or_default()
            .push(listener);
    }

    /// Iterates subscribers of `topic` in registration order. A panic
    /// inside one subscriber's future would otherwise poison the whole
    /// publish call, so subscribers are expected to report failures via
    /// logging internally rather than unwind — the bus itself has no
    /// try/catch boundary beyond "keep going to the next listener".
    pub async fn publish(&self, topic: Topic, payload: EventPayload) {
        let snapshot = {
            let guard = self.listeners.read().await;
            guard.get(&topic).cloned().unwrap_or_default()
        };
        for listener in snapshot {
            listener.on_event(&payload).await;
        }
    }

    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.listeners
            .read()
            .await
            .get(&topic)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener that just logs — useful as a default subscriber and in tests,
/// mirroring the teacher's `LoggingListener`.
pub struct LoggingListener;

#[async_trait]
impl Listener for LoggingListener {
    async fn on_event(&self, payload: &EventPayload) {
        tracing::info!(?payload, "event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Listener for CountingListener {
        async fn on_event(&self, _payload: &EventPayload) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FailingListener;

    #[async_trait]
    impl Listener for FailingListener {
        async fn on_event(&self, _payload: &EventPayload) {
            error!("simulated subscriber failure");
        }
    }

    #[tokio::test]
    async fn subscribe_and_publish_delivers_to_all() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            Topic::SignalGenerated,
            Arc::new(CountingListener {
                count: Arc::clone(&count),
            }),
        )
        .await;
        bus.subscribe(
            Topic::SignalGenerated,
            Arc::new(CountingListener {
                count: Arc::clone(&count),
            }),
        )
        .await;

        let signal = Signal::new("BTCUSDT", 0.5, vec![], 1.0, 0);
        bus.publish(Topic::SignalGenerated, EventPayload::SignalGenerated(signal)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_block_later_ones() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Topic::OrderRequest, Arc::new(FailingListener)).await;
        bus.subscribe(
            Topic::OrderRequest,
            Arc::new(CountingListener {
                count: Arc::clone(&count),
            }),
        )
        .await;

        let order = Order::new("BTCUSDT", crate::domain::OrderSide::Buy, 1.0, crate::domain::OrderType::Market, 0.5, 0);
        bus.publish(Topic::OrderRequest, EventPayload::OrderRequest(order)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            Topic::TickUpdate,
            Arc::new(CountingListener {
                count: Arc::clone(&count),
            }),
        )
        .await;

        let order = Order::new("ETHUSDT", crate::domain::OrderSide::Sell, 1.0, crate::domain::OrderType::Market, 0.5, 0);
        bus.publish(Topic::OrderRequest, EventPayload::OrderRequest(order)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(Topic::TickUpdate).await, 1);
        assert_eq!(bus.subscriber_count(Topic::OrderRequest).await, 0);
    }
}
