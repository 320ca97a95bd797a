//! Topic-exchange messaging fabric: three durable exchanges
//! (`commands`, `events`, `responses`), dotted routing keys, prefetch=1
//! consumption, and bounded-redelivery dead-lettering.
//!
//! Generalized from the teacher's in-process `EventBus<T>`
//! (`services/common::event_bus`), which already modeled topic
//! broadcast, metrics, and a dead-letter queue; this crate adds the
//! exchange/routing-key split and durability semantics spec.md §4.7
//! requires.

mod adapter;
mod envelope;
mod error;
mod exchange;
mod metrics;

pub use adapter::{BusAdapter, Handler, Outcome, Subscription, run_consumer};
pub use envelope::{Envelope, RawEnvelope};
pub use error::{BusError, BusResult};
pub use exchange::Exchange;
pub use metrics::BusMetrics;
