//! The bus adapter: durable topic exchanges, literal routing-key
//! queues, publisher confirms, and prefetch=1 consumption.
//!
//! Generalizes the teacher's `services-common::event_bus::EventBus`
//! (one flat topic space, `tokio::sync::broadcast` fan-out, a
//! dead-letter queue, and metrics) into three named exchanges with
//! dotted routing keys bound per-queue, matching spec.md §4.7 and §6.
//! Durability is modeled by appending every published envelope to a
//! per-exchange log file before fan-out, so a restart can prove nothing
//! was silently dropped even though in-memory subscribers do not replay
//! history — saga resumption instead relies on the saga log (spec.md
//! §5), not bus replay.

use crate::envelope::RawEnvelope;
use crate::error::{BusError, BusResult};
use crate::exchange::Exchange;
use crate::metrics::BusMetrics;
use forgemesh_common::BusConfig;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};
use uuid::Uuid;

const QUEUE_CAPACITY: usize = 1024;

struct ExchangeState {
    queues: parking_lot::RwLock<FxHashMap<String, broadcast::Sender<RawEnvelope>>>,
    durable_log: Mutex<tokio::fs::File>,
    dead_letter_log: Mutex<tokio::fs::File>,
}

/// Handle to the three durable topic exchanges. Cheap to clone (it's an
/// `Arc` internally would be typical, but services hold it behind their
/// own `Arc` so this type is constructed once per process).
pub struct BusAdapter {
    config: BusConfig,
    exchanges: FxHashMap<Exchange, ExchangeState>,
    metrics: Arc<BusMetrics>,
}

impl BusAdapter {
    /// Declare the three durable topic exchanges, opening their append
    /// logs under `config.durable_log_dir`.
    pub async fn connect(config: BusConfig) -> BusResult<Self> {
        tokio::fs::create_dir_all(&config.durable_log_dir)
            .await
            .map_err(|e| BusError::Configuration(e.to_string()))?;

        let mut exchanges = FxHashMap::default();
        for exchange in Exchange::all() {
            let durable_log = open_append_log(&config.durable_log_dir, exchange, "log").await?;
            let dead_letter_log =
                open_append_log(&config.durable_log_dir, exchange, "deadletter").await?;
            exchanges.insert(
                exchange,
                ExchangeState {
                    queues: parking_lot::RwLock::new(FxHashMap::default()),
                    durable_log: Mutex::new(durable_log),
                    dead_letter_log: Mutex::new(dead_letter_log),
                },
            );
        }

        debug!(dir = %config.durable_log_dir, "bus adapter connected, exchanges declared");
        Ok(Self {
            config,
            exchanges,
            metrics: Arc::new(BusMetrics::new()),
        })
    }

    /// Bus-wide metrics, shared by every consumer and publisher.
    #[must_use]
    pub fn metrics(&self) -> Arc<BusMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Configured prefetch; every consumer processes one message to
    /// completion before the next (spec.md §4.7, §5).
    #[must_use]
    pub const fn prefetch(&self) -> usize {
        self.config.prefetch
    }

    fn state(&self, exchange: Exchange) -> &ExchangeState {
        self.exchanges
            .get(&exchange)
            .expect("all three exchanges are declared at connect()")
    }

    fn queue(&self, exchange: Exchange, routing_key: &str) -> broadcast::Sender<RawEnvelope> {
        let state = self.state(exchange);
        if let Some(tx) = state.queues.read().get(routing_key) {
            return tx.clone();
        }
        let mut queues = state.queues.write();
        queues
            .entry(routing_key.to_string())
            .or_insert_with(|| broadcast::channel(QUEUE_CAPACITY).0)
            .clone()
    }

    /// Publish fire-and-forget with a publisher confirm: the call only
    /// returns `Ok` once the envelope has been durably appended.
    pub async fn publish<T: Serialize>(
        &self,
        exchange: Exchange,
        routing_key: &str,
        body: &T,
    ) -> BusResult<()> {
        let envelope = RawEnvelope {
            message_id: Uuid::new_v4(),
            exchange,
            routing_key: routing_key.to_string(),
            published_at: chrono::Utc::now(),
            redelivery_count: 0,
            body: serde_json::to_value(body)?,
        };
        self.append_durable(exchange, &envelope).await?;
        self.dispatch(routing_key, envelope);
        self.metrics.record_publish(routing_key);
        Ok(())
    }

    /// Re-publish an envelope that a handler asked to be retried,
    /// bumping its redelivery count.
    async fn requeue(&self, mut envelope: RawEnvelope) -> BusResult<()> {
        envelope.redelivery_count += 1;
        self.append_durable(envelope.exchange, &envelope).await?;
        self.dispatch(envelope.routing_key.clone(), envelope);
        Ok(())
    }

    async fn dead_letter(&self, envelope: RawEnvelope) -> BusResult<()> {
        warn!(
            message_id = %envelope.message_id,
            routing_key = %envelope.routing_key,
            "message exceeded redelivery budget, routed to dead letter"
        );
        let state = self.state(envelope.exchange);
        let line = serde_json::to_string(&envelope)?;
        let mut file = state.dead_letter_log.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| BusError::Configuration(e.to_string()))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| BusError::Configuration(e.to_string()))?;
        self.metrics.record_dead_letter(&envelope.routing_key);
        Ok(())
    }

    fn dispatch(&self, routing_key: impl AsRef<str>, envelope: RawEnvelope) {
        let tx = self.queue(envelope.exchange, routing_key.as_ref());
        // No subscribers is not an error: responses/events may be
        // published before a participant has started consuming.
        let _ = tx.send(envelope);
    }

    async fn append_durable(&self, exchange: Exchange, envelope: &RawEnvelope) -> BusResult<()> {
        let state = self.state(exchange);
        let line = serde_json::to_string(envelope)?;
        let mut file = state.durable_log.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| BusError::Configuration(e.to_string()))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| BusError::Configuration(e.to_string()))
    }

    /// Bind a literal-key queue and start receiving from it. Business
    /// services always bind literal keys (spec.md §4.7); only an
    /// out-of-scope log sink would bind `#`.
    #[must_use]
    pub fn subscribe(&self, exchange: Exchange, routing_key: &str) -> Subscription {
        let receiver = self.queue(exchange, routing_key).subscribe();
        Subscription {
            receiver,
            routing_key: routing_key.to_string(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Requeue or dead-letter an envelope on behalf of a consumer loop,
    /// depending on whether it has exhausted its redelivery budget.
    pub(crate) async fn handle_retry(
        &self,
        envelope: RawEnvelope,
        max_redeliveries: u32,
    ) -> BusResult<()> {
        self.metrics.record_handler_failure(&envelope.routing_key);
        if envelope.redelivery_count >= max_redeliveries {
            self.dead_letter(envelope).await
        } else {
            self.requeue(envelope).await
        }
    }
}

async fn open_append_log(dir: &str, exchange: Exchange, suffix: &str) -> BusResult<tokio::fs::File> {
    let path = format!("{dir}/{}.{suffix}.jsonl", exchange.name());
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|e| BusError::Configuration(format!("{path}: {e}")))
}

/// A live binding to one exchange/routing-key queue.
pub struct Subscription {
    receiver: broadcast::Receiver<RawEnvelope>,
    routing_key: String,
    metrics: Arc<BusMetrics>,
}

impl Subscription {
    /// Receive the next envelope, skipping past any that were dropped
    /// because this consumer fell behind (broadcast lag).
    pub async fn recv(&mut self) -> Option<RawEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    self.metrics.record_delivery(&self.routing_key);
                    return Some(envelope);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        routing_key = %self.routing_key,
                        skipped,
                        "consumer lagged, messages were dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Outcome a handler returns for a consumed message, mapping onto
/// spec.md §7's error taxonomy.
pub enum Outcome {
    /// Handled successfully (or a business refusal reported in a
    /// response payload); acknowledge.
    Ack,
    /// Payload or state-machine error (kinds 2/3 in spec.md §7); log
    /// and acknowledge, never requeue.
    Drop,
    /// Internal fault (kind 5); nack and requeue up to the bounded
    /// redelivery count, then dead-letter.
    Retry,
}

/// Per-message handler for a bound queue, mirroring the teacher's
/// `MessageHandler<T>` trait.
#[async_trait::async_trait]
pub trait Handler<T: DeserializeOwned + Send + Sync + 'static>: Send + Sync {
    /// Handle one typed envelope.
    async fn handle(&self, envelope: crate::envelope::Envelope<T>) -> Outcome;
}

/// Drive a bound queue to completion with prefetch=1: each envelope is
/// fully handled (including any retry bookkeeping) before the next is
/// received.
pub async fn run_consumer<T>(
    adapter: Arc<BusAdapter>,
    exchange: Exchange,
    routing_key: &str,
    max_redeliveries: u32,
    handler: Arc<dyn Handler<T>>,
) where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let mut subscription = adapter.subscribe(exchange, routing_key);
    while let Some(raw) = subscription.recv().await {
        let redelivery_count = raw.redelivery_count;
        let routing_key = raw.routing_key.clone();
        let typed = match raw.clone().into_typed::<T>() {
            Ok(typed) => typed,
            Err(err) => {
                warn!(%routing_key, %err, "malformed payload, acking without processing");
                continue;
            }
        };
        match handler.handle(typed).await {
            Outcome::Ack => {}
            Outcome::Drop => {
                debug!(%routing_key, "handler dropped message (business/state refusal)");
            }
            Outcome::Retry => {
                let mut envelope = raw;
                envelope.redelivery_count = redelivery_count;
                if let Err(err) = adapter.handle_retry(envelope, max_redeliveries).await {
                    warn!(%routing_key, %err, "failed to requeue/dead-letter message");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    #[tokio::test]
    async fn publish_then_subscribe_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = BusAdapter::connect(BusConfig {
            durable_log_dir: dir.path().to_string_lossy().to_string(),
            prefetch: 1,
        })
        .await
        .unwrap();

        let mut sub = adapter.subscribe(Exchange::Commands, "payment.check");
        adapter
            .publish(Exchange::Commands, "payment.check", &Ping { n: 7 })
            .await
            .unwrap();

        let raw = sub.recv().await.unwrap();
        let typed: crate::envelope::Envelope<Ping> = raw.into_typed().unwrap();
        assert_eq!(typed.body.n, 7);
        assert_eq!(adapter.metrics().published_count("payment.check"), 1);
    }

    #[tokio::test]
    async fn distinct_routing_keys_do_not_cross_talk() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = BusAdapter::connect(BusConfig {
            durable_log_dir: dir.path().to_string_lossy().to_string(),
            prefetch: 1,
        })
        .await
        .unwrap();

        let mut a = adapter.subscribe(Exchange::Events, "piece_a.requested");
        let mut b = adapter.subscribe(Exchange::Events, "piece_b.requested");

        adapter
            .publish(Exchange::Events, "piece_a.requested", &Ping { n: 1 })
            .await
            .unwrap();

        let received = a.recv().await.unwrap();
        assert_eq!(received.routing_key, "piece_a.requested");
        assert!(b.receiver.try_recv().is_err());
    }
}
