//! Error taxonomy for the saga crate, following the teacher's
//! `services-oms::error::OmsError` shape: structured variants,
//! `#[from]` wrapping for lower layers, one crate-local `Result` alias.

use uuid::Uuid;

/// Errors raised while mutating the order state machine or the saga
/// log.
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error("order {order_id} not found")]
    OrderNotFound { order_id: Uuid },

    #[error("order {order_id} cannot transition {from} -> {to}")]
    InvalidTransition {
        order_id: Uuid,
        from: String,
        to: String,
    },

    #[error("order {order_id} is already in a terminal state ({status})")]
    TerminalOrder { order_id: Uuid, status: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Crate-local result alias.
pub type SagaResult<T> = Result<T, SagaError>;
