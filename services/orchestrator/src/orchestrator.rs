//! The order saga orchestrator (spec.md §4.1): owns the state machine,
//! issues commands, and is the only writer of `order.status`.

use crate::catalog::Catalog;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::order_store::OrderStore;
use forgemesh_bus::{BusAdapter, Exchange};
use forgemesh_saga::{Order, OrderLifecycle, OrderStatus, SagaEntry, SagaLog};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Request body for `POST /create_order` (spec.md §6).
pub struct CreateOrderRequest {
    pub client_id: String,
    pub count_a: u32,
    pub count_b: u32,
    pub description: String,
}

#[derive(Debug, Serialize)]
struct OrderCreatedPendingEvent {
    order_id: Uuid,
    client_id: String,
    count_a: u32,
    count_b: u32,
}

#[derive(Debug, Serialize)]
struct DeliveryCheckCommand {
    order_id: Uuid,
    client_id: String,
}

#[derive(Debug, Serialize)]
struct PaymentCheckCommand {
    order_id: Uuid,
    client_id: String,
    movement: f64,
}

#[derive(Debug, Serialize)]
struct WarehouseRequestedEvent {
    order_id: Uuid,
    client_id: String,
    count_a: u32,
    count_b: u32,
}

#[derive(Debug, Serialize)]
struct OrderRefCommand {
    order_id: Uuid,
}

#[derive(Debug, Serialize)]
struct OrderClientCommand {
    order_id: Uuid,
    client_id: String,
}

/// Owns the order state machine, the saga log, the catalog, and the
/// bus handle every command is published through.
pub struct OrderSaga {
    pub(crate) orders: Arc<OrderStore>,
    pub(crate) saga_log: Arc<SagaLog>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) bus: Arc<BusAdapter>,
    lifecycle: OrderLifecycle,
}

impl OrderSaga {
    #[must_use]
    pub fn new(
        orders: Arc<OrderStore>,
        saga_log: Arc<SagaLog>,
        catalog: Arc<Catalog>,
        bus: Arc<BusAdapter>,
    ) -> Self {
        Self {
            orders,
            saga_log,
            catalog,
            bus,
            lifecycle: OrderLifecycle::new(),
        }
    }

    /// `POST /create_order`: creates the order row, appends the first
    /// saga entry, and issues `delivery.check`.
    pub async fn create_order(&self, request: CreateOrderRequest) -> OrchestratorResult<Order> {
        let order = Order::new(
            request.client_id.clone(),
            request.count_a,
            request.count_b,
            request.description,
        );
        self.orders.insert(&order).await?;
        self.saga_log
            .append(order.order_id, OrderStatus::DeliveryPending)
            .await?;

        self.bus
            .publish(
                Exchange::Events,
                "events.order.created.pending",
                &OrderCreatedPendingEvent {
                    order_id: order.order_id,
                    client_id: request.client_id.clone(),
                    count_a: order.count_a,
                    count_b: order.count_b,
                },
            )
            .await?;
        self.bus
            .publish(
                Exchange::Commands,
                "delivery.check",
                &DeliveryCheckCommand {
                    order_id: order.order_id,
                    client_id: request.client_id,
                },
            )
            .await?;

        info!(order_id = %order.order_id, "order created, delivery.check issued");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> OrchestratorResult<Option<Order>> {
        Ok(self.orders.get(order_id).await?)
    }

    /// `GET /order/sagashistory/{order_id}`.
    pub async fn history(&self, order_id: Uuid) -> OrchestratorResult<Vec<SagaEntry>> {
        Ok(self.saga_log.history(order_id).await?)
    }

    /// `POST /order/cancel/{order_id}`: admissible only from `Queued`
    /// (spec.md §6). Returns `Ok(true)` on success, `Ok(false)` when
    /// the order is in a pending saga state (caller maps to HTTP 409).
    pub async fn cancel_order(&self, order_id: Uuid) -> OrchestratorResult<bool> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrchestratorError::OrderNotFound(order_id))?;

        if !OrderLifecycle::can_cancel(order.status) {
            return Ok(false);
        }

        self.apply_transition(order_id, OrderStatus::OrderCancelDeliveryPending)
            .await?;
        self.bus
            .publish(
                Exchange::Commands,
                "delivery.check_cancel",
                &OrderRefCommand { order_id },
            )
            .await?;
        Ok(true)
    }

    /// `PUT /order/update/{order_id}`: admin-only partial update, limited
    /// to the description (spec.md §6) since counts and status are
    /// saga-owned once an order exists.
    pub async fn update_description(
        &self,
        order_id: Uuid,
        description: Option<String>,
    ) -> OrchestratorResult<Order> {
        if let Some(description) = description {
            self.orders.update_description(order_id, &description).await?;
        }
        self.orders
            .get(order_id)
            .await?
            .ok_or(OrchestratorError::OrderNotFound(order_id))
    }

    /// Transition guarded by the legal-transition table; the caller is
    /// trusted to have already checked the precondition it cares about
    /// (see [`Self::try_transition_from`] for the idempotency-guarded
    /// path used by response handlers).
    async fn apply_transition(&self, order_id: Uuid, to: OrderStatus) -> OrchestratorResult<()> {
        self.saga_log.append(order_id, to).await?;
        self.orders.set_status(order_id, to).await?;
        Ok(())
    }

    /// Guarded transition used by response/event handlers: only mutates
    /// if the order's current status matches `expected_from` exactly,
    /// which is spec.md §4.1 invariant 3's duplicate-response defense
    /// (scenario 6: a duplicate `payment.checked` must not append a
    /// second `Queued` entry). Returns whether it mutated.
    pub(crate) async fn try_transition_from(
        &self,
        order_id: Uuid,
        expected_from: OrderStatus,
        to: OrderStatus,
    ) -> OrchestratorResult<bool> {
        let Some(order) = self.orders.get(order_id).await? else {
            warn!(%order_id, "response for unknown order, acking without mutation");
            return Ok(false);
        };
        if order.status != expected_from {
            warn!(
                %order_id,
                current = %order.status,
                expected = %expected_from,
                "stale or duplicate response, ignoring"
            );
            return Ok(false);
        }
        if !self.lifecycle.can_transition(expected_from, to) {
            warn!(%order_id, from = %expected_from, %to, "illegal transition refused");
            return Ok(false);
        }
        self.apply_transition(order_id, to).await?;
        Ok(true)
    }

    /// Total cost for an order, read from the catalog at publish time.
    pub(crate) async fn total_cost(&self, count_a: u32, count_b: u32) -> OrchestratorResult<f64> {
        Ok(self.catalog.total_cost(count_a, count_b).await?.as_decimal())
    }

    pub(crate) async fn publish_payment_check(
        &self,
        order_id: Uuid,
        client_id: &str,
        movement: f64,
    ) -> OrchestratorResult<()> {
        self.bus
            .publish(
                Exchange::Commands,
                "payment.check",
                &PaymentCheckCommand {
                    order_id,
                    client_id: client_id.to_string(),
                    movement,
                },
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn publish_warehouse_requested(
        &self,
        order_id: Uuid,
        client_id: &str,
        count_a: u32,
        count_b: u32,
    ) -> OrchestratorResult<()> {
        self.bus
            .publish(
                Exchange::Events,
                "warehouse.requested",
                &WarehouseRequestedEvent {
                    order_id,
                    client_id: client_id.to_string(),
                    count_a,
                    count_b,
                },
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn publish_delivery_cancel(
        &self,
        order_id: Uuid,
        client_id: &str,
    ) -> OrchestratorResult<()> {
        self.bus
            .publish(
                Exchange::Commands,
                "delivery.cancel",
                &OrderClientCommand {
                    order_id,
                    client_id: client_id.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn publish_payment_check_cancel(
        &self,
        order_id: Uuid,
        client_id: &str,
        movement: f64,
    ) -> OrchestratorResult<()> {
        self.bus
            .publish(
                Exchange::Commands,
                "payment.check_cancel",
                &PaymentCheckCommand {
                    order_id,
                    client_id: client_id.to_string(),
                    movement,
                },
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn publish_warehouse_check_cancel(
        &self,
        order_id: Uuid,
        client_id: &str,
    ) -> OrchestratorResult<()> {
        self.bus
            .publish(
                Exchange::Commands,
                "warehouse.check_cancel",
                &OrderClientCommand {
                    order_id,
                    client_id: client_id.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn publish_payment_revert_cancel(
        &self,
        order_id: Uuid,
        client_id: &str,
    ) -> OrchestratorResult<()> {
        self.bus
            .publish(
                Exchange::Commands,
                "payment.revert_cancel",
                &OrderClientCommand {
                    order_id,
                    client_id: client_id.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn publish_delivery_revert_cancel(
        &self,
        order_id: Uuid,
    ) -> OrchestratorResult<()> {
        self.bus
            .publish(
                Exchange::Commands,
                "delivery.revert_cancel",
                &OrderRefCommand { order_id },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgemesh_common::BusConfig;

    async fn test_saga() -> OrderSaga {
        let log_dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(
            BusAdapter::connect(BusConfig {
                durable_log_dir: log_dir.path().to_string_lossy().to_string(),
                prefetch: 1,
            })
            .await
            .unwrap(),
        );
        let orders = Arc::new(OrderStore::connect("sqlite::memory:").await.unwrap());
        let saga_log = Arc::new(SagaLog::connect("sqlite::memory:").await.unwrap());
        let catalog = Arc::new(Catalog::connect("sqlite::memory:").await.unwrap());
        OrderSaga::new(orders, saga_log, catalog, bus)
    }

    /// Scenario 6 (spec.md §8): a duplicate response must not transition
    /// the order twice.
    #[tokio::test]
    async fn try_transition_from_is_idempotent_under_duplicate_response() {
        let saga = test_saga().await;
        let order = Order::new("client-dup".to_string(), 1, 0, "one A".to_string());
        saga.orders.insert(&order).await.unwrap();
        saga.saga_log
            .append(order.order_id, OrderStatus::PaymentPending)
            .await
            .unwrap();
        saga.orders
            .set_status(order.order_id, OrderStatus::PaymentPending)
            .await
            .unwrap();

        let first = saga
            .try_transition_from(order.order_id, OrderStatus::PaymentPending, OrderStatus::Queued)
            .await
            .unwrap();
        assert!(first);

        let second = saga
            .try_transition_from(order.order_id, OrderStatus::PaymentPending, OrderStatus::Queued)
            .await
            .unwrap();
        assert!(!second);

        let history = saga.history(order.order_id).await.unwrap();
        assert_eq!(
            history.iter().filter(|e| e.status == OrderStatus::Queued).count(),
            1
        );
        assert_eq!(
            saga.get_order(order.order_id).await.unwrap().unwrap().status,
            OrderStatus::Queued
        );
    }

    #[tokio::test]
    async fn try_transition_from_refuses_on_unknown_order() {
        let saga = test_saga().await;
        let mutated = saga
            .try_transition_from(Uuid::new_v4(), OrderStatus::PaymentPending, OrderStatus::Queued)
            .await
            .unwrap();
        assert!(!mutated);
    }

    #[tokio::test]
    async fn total_cost_reads_through_the_seeded_catalog() {
        let saga = test_saga().await;
        let cost = saga.total_cost(2, 1).await.unwrap();
        assert!((cost - 11.00).abs() < f64::EPSILON);
    }
}
