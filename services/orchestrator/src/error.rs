//! Error taxonomy for the orchestrator, following the teacher's
//! `OmsError` shape.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("order {order_id} cannot be canceled from status {status}")]
    NotCancelable { order_id: Uuid, status: String },

    #[error("saga error: {0}")]
    Saga(#[from] forgemesh_saga::SagaError),

    #[error("order store error: {0}")]
    OrderStore(#[from] crate::order_store::OrderStoreError),

    #[error("catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    #[error("bus error: {0}")]
    Bus(#[from] forgemesh_bus::BusError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
