//! Per-routing-key counters, mirroring the teacher's `BusMetrics`
//! (attempts/successes/failures/dead-letters keyed by topic).

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    handler_failures: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Bus-wide metrics collector, one counter set per routing key.
#[derive(Default)]
pub struct BusMetrics {
    by_key: RwLock<FxHashMap<String, Counters>>,
}

impl BusMetrics {
    /// Create an empty metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counters<F: FnOnce(&Counters)>(&self, routing_key: &str, f: F) {
        if let Some(counters) = self.by_key.read().get(routing_key) {
            f(counters);
            return;
        }
        let mut guard = self.by_key.write();
        let counters = guard.entry(routing_key.to_string()).or_default();
        f(counters);
    }

    /// Record a successful publish.
    pub fn record_publish(&self, routing_key: &str) {
        self.with_counters(routing_key, |c| {
            c.published.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Record a delivery to a consumer handler.
    pub fn record_delivery(&self, routing_key: &str) {
        self.with_counters(routing_key, |c| {
            c.delivered.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Record a handler failure (nack).
    pub fn record_handler_failure(&self, routing_key: &str) {
        self.with_counters(routing_key, |c| {
            c.handler_failures.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Record a message routed to the dead-letter sink.
    pub fn record_dead_letter(&self, routing_key: &str) {
        self.with_counters(routing_key, |c| {
            c.dead_lettered.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Number of messages published on a routing key (test/debug use).
    #[must_use]
    pub fn published_count(&self, routing_key: &str) -> u64 {
        self.by_key
            .read()
            .get(routing_key)
            .map_or(0, |c| c.published.load(Ordering::Relaxed))
    }

    /// Number of messages sent to the dead-letter sink for a routing key.
    #[must_use]
    pub fn dead_letter_count(&self, routing_key: &str) -> u64 {
        self.by_key
            .read()
            .get(routing_key)
            .map_or(0, |c| c.dead_lettered.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_key() {
        let metrics = BusMetrics::new();
        metrics.record_publish("payment.check");
        metrics.record_publish("payment.check");
        metrics.record_publish("delivery.check");

        assert_eq!(metrics.published_count("payment.check"), 2);
        assert_eq!(metrics.published_count("delivery.check"), 1);
        assert_eq!(metrics.published_count("unused.key"), 0);
    }
}
