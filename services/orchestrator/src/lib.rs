//! The saga orchestrator: owns order state, issues commands, consumes
//! responses and events, and exposes the platform's HTTP surface
//! (spec.md §4.1, §6; SPEC_FULL §4).

mod catalog;
mod error;
mod handler;
mod http;
mod order_store;
mod orchestrator;

pub use catalog::{Catalog, CatalogError};
pub use error::{OrchestratorError, OrchestratorResult};
pub use handler::{
    DeliveryCanceledHandler, DeliveryCheckedCancelHandler, DeliveryCheckedHandler,
    DeliveryRevertedCancelHandler, OrdersDeliveredHandler, OrdersDeliveringHandler,
    OrdersProducedHandler, PaymentCheckedCancelHandler, PaymentCheckedHandler,
    PaymentRevertedCancelHandler, WarehouseCheckedCancelHandler, WarehouseOrderCanceledHandler,
};
pub use http::build_router;
pub use order_store::{OrderStore, OrderStoreError};
pub use orchestrator::{CreateOrderRequest, OrderSaga};
