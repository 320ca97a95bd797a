//! The message envelope carried on every exchange.

use crate::exchange::Exchange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Wire envelope: what actually travels on the bus. The body is kept as
/// raw JSON so the adapter never needs to know the shape of any
/// particular routing key's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEnvelope {
    /// Unique id for this delivery attempt's message.
    pub message_id: Uuid,
    /// Exchange the message was published on.
    pub exchange: Exchange,
    /// Dotted routing key, e.g. `payment.check`.
    pub routing_key: String,
    /// Publish time.
    pub published_at: DateTime<Utc>,
    /// How many times this message has been redelivered after a nack.
    pub redelivery_count: u32,
    /// `content_type: text/plain` UTF-8 JSON body (spec.md §6).
    pub body: serde_json::Value,
}

/// A typed envelope handed to a handler once the body has been
/// deserialized.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    /// Unique id for this delivery attempt's message.
    pub message_id: Uuid,
    /// Exchange the message was published on.
    pub exchange: Exchange,
    /// Dotted routing key, e.g. `payment.check`.
    pub routing_key: String,
    /// Publish time.
    pub published_at: DateTime<Utc>,
    /// How many times this message has been redelivered after a nack.
    pub redelivery_count: u32,
    /// Deserialized payload.
    pub body: T,
}

impl RawEnvelope {
    /// Deserialize the body into a typed envelope. A failure here is a
    /// payload error per spec.md §7 (kind 2): the caller should log and
    /// ack, never requeue.
    pub fn into_typed<T: DeserializeOwned>(self) -> serde_json::Result<Envelope<T>> {
        let body = serde_json::from_value(self.body)?;
        Ok(Envelope {
            message_id: self.message_id,
            exchange: self.exchange,
            routing_key: self.routing_key,
            published_at: self.published_at,
            redelivery_count: self.redelivery_count,
            body,
        })
    }
}
