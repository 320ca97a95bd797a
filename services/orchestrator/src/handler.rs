//! Response/event handlers that drive the orchestrator's state machine
//! (spec.md §4.1 "Response consumption").

use crate::error::OrchestratorError;
use crate::orchestrator::OrderSaga;
use async_trait::async_trait;
use forgemesh_bus::{Envelope, Handler, Outcome};
use forgemesh_saga::OrderStatus;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    #[serde(alias = "id_order")]
    order_id: Uuid,
    status: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrderRef {
    #[serde(alias = "id_order")]
    order_id: Uuid,
}

fn storage_failure(order_id: Uuid, err: &OrchestratorError) -> Outcome {
    error!(%order_id, %err, "orchestrator storage/bus error");
    Outcome::Retry
}

/// `delivery.checked`: advance to `PaymentPending` on acceptance,
/// straight to `Canceled` on a rejected address (spec.md §4.1, scenario
/// 3 "Bad address").
pub struct DeliveryCheckedHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<StatusResponse> for DeliveryCheckedHandler {
    async fn handle(&self, envelope: Envelope<StatusResponse>) -> Outcome {
        let StatusResponse { order_id, status } = envelope.body;

        let target = if status {
            OrderStatus::PaymentPending
        } else {
            OrderStatus::Canceled
        };
        let mutated = match self
            .saga
            .try_transition_from(order_id, OrderStatus::DeliveryPending, target)
            .await
        {
            Ok(mutated) => mutated,
            Err(err) => return storage_failure(order_id, &err),
        };
        if !mutated || !status {
            return Outcome::Ack;
        }

        let order = match self.saga.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return Outcome::Drop,
            Err(err) => return storage_failure(order_id, &err),
        };
        let movement = match self.saga.total_cost(order.count_a, order.count_b).await {
            Ok(cost) => -cost,
            Err(err) => return storage_failure(order_id, &err),
        };
        if let Err(err) = self
            .saga
            .publish_payment_check(order_id, &order.client_id, movement)
            .await
        {
            return storage_failure(order_id, &err);
        }
        Outcome::Ack
    }
}

/// `payment.checked`: advance to `Queued` and request warehouse
/// reservation, or fall into `DeliveryCanceling` on insufficient funds
/// (spec.md §4.1, scenario 2). The saga-log payment-segment check
/// (§9, Open Question 3) is the idempotency guard behind
/// `try_transition_from`'s current-status comparison.
pub struct PaymentCheckedHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<StatusResponse> for PaymentCheckedHandler {
    async fn handle(&self, envelope: Envelope<StatusResponse>) -> Outcome {
        let StatusResponse { order_id, status } = envelope.body;

        match self.saga.saga_log.has_payment_segment(order_id).await {
            Ok(false) => {
                warn!(%order_id, "payment.checked for an order with no payment segment, acking");
                return Outcome::Drop;
            }
            Ok(true) => {}
            Err(err) => return storage_failure(order_id, &err.into()),
        }

        let target = if status {
            OrderStatus::Queued
        } else {
            OrderStatus::DeliveryCanceling
        };
        let mutated = match self
            .saga
            .try_transition_from(order_id, OrderStatus::PaymentPending, target)
            .await
        {
            Ok(mutated) => mutated,
            Err(err) => return storage_failure(order_id, &err),
        };
        if !mutated {
            return Outcome::Ack;
        }

        let order = match self.saga.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return Outcome::Drop,
            Err(err) => return storage_failure(order_id, &err),
        };

        let publish_result = if status {
            self.saga
                .publish_warehouse_requested(order_id, &order.client_id, order.count_a, order.count_b)
                .await
        } else {
            self.saga
                .publish_delivery_cancel(order_id, &order.client_id)
                .await
        };
        if let Err(err) = publish_result {
            return storage_failure(order_id, &err);
        }
        Outcome::Ack
    }
}

/// `delivery.canceled`: closes the `DeliveryCanceling` branch.
pub struct DeliveryCanceledHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<OrderRef> for DeliveryCanceledHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        match self
            .saga
            .try_transition_from(order_id, OrderStatus::DeliveryCanceling, OrderStatus::Canceled)
            .await
        {
            Ok(_) => Outcome::Ack,
            Err(err) => storage_failure(order_id, &err),
        }
    }
}

/// `orders.produced`: the order's pieces are ready; advance
/// `Queued -> Produced`.
pub struct OrdersProducedHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<OrderRef> for OrdersProducedHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        match self
            .saga
            .try_transition_from(order_id, OrderStatus::Queued, OrderStatus::Produced)
            .await
        {
            Ok(_) => Outcome::Ack,
            Err(err) => storage_failure(order_id, &err),
        }
    }
}

/// `orders.delivering`: advance `Produced -> Delivering`.
pub struct OrdersDeliveringHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<OrderRef> for OrdersDeliveringHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        match self
            .saga
            .try_transition_from(order_id, OrderStatus::Produced, OrderStatus::Delivering)
            .await
        {
            Ok(_) => Outcome::Ack,
            Err(err) => storage_failure(order_id, &err),
        }
    }
}

/// `orders.delivered`: advance `Delivering -> Delivered` (terminal).
pub struct OrdersDeliveredHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<OrderRef> for OrdersDeliveredHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        match self
            .saga
            .try_transition_from(order_id, OrderStatus::Delivering, OrderStatus::Delivered)
            .await
        {
            Ok(_) => Outcome::Ack,
            Err(err) => storage_failure(order_id, &err),
        }
    }
}

/// `delivery.checked_cancel`: advance the cancel branch to
/// `OrderCancelPaymentPending` and request the payment credit.
pub struct DeliveryCheckedCancelHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<StatusResponse> for DeliveryCheckedCancelHandler {
    async fn handle(&self, envelope: Envelope<StatusResponse>) -> Outcome {
        let StatusResponse { order_id, status } = envelope.body;
        if !status {
            // Too late to cancel at the delivery stage; spec.md does not
            // define a compensating path back from here, so the order is
            // left for operator attention rather than silently mutated.
            warn!(%order_id, "delivery refused check_cancel, leaving order for manual review");
            return Outcome::Drop;
        }

        let mutated = match self
            .saga
            .try_transition_from(
                order_id,
                OrderStatus::OrderCancelDeliveryPending,
                OrderStatus::OrderCancelPaymentPending,
            )
            .await
        {
            Ok(mutated) => mutated,
            Err(err) => return storage_failure(order_id, &err),
        };
        if !mutated {
            return Outcome::Ack;
        }

        let order = match self.saga.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return Outcome::Drop,
            Err(err) => return storage_failure(order_id, &err),
        };
        let movement = match self.saga.total_cost(order.count_a, order.count_b).await {
            Ok(cost) => cost,
            Err(err) => return storage_failure(order_id, &err),
        };
        if let Err(err) = self
            .saga
            .publish_payment_check_cancel(order_id, &order.client_id, movement)
            .await
        {
            return storage_failure(order_id, &err);
        }
        Outcome::Ack
    }
}

/// `payment.checked_cancel`: advance to `OrderCancelWarehousePending`
/// and ask the warehouse to release the order's pieces.
pub struct PaymentCheckedCancelHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<StatusResponse> for PaymentCheckedCancelHandler {
    async fn handle(&self, envelope: Envelope<StatusResponse>) -> Outcome {
        let order_id = envelope.body.order_id;
        let mutated = match self
            .saga
            .try_transition_from(
                order_id,
                OrderStatus::OrderCancelPaymentPending,
                OrderStatus::OrderCancelWarehousePending,
            )
            .await
        {
            Ok(mutated) => mutated,
            Err(err) => return storage_failure(order_id, &err),
        };
        if !mutated {
            return Outcome::Ack;
        }

        let order = match self.saga.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return Outcome::Drop,
            Err(err) => return storage_failure(order_id, &err),
        };
        if let Err(err) = self
            .saga
            .publish_warehouse_check_cancel(order_id, &order.client_id)
            .await
        {
            return storage_failure(order_id, &err);
        }
        Outcome::Ack
    }
}

/// `warehouse.checked_cancel`: on success, the cancellation completes;
/// on failure (already fabricated/shipped) the compensation chain
/// begins with `payment.revert_cancel`.
pub struct WarehouseCheckedCancelHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<StatusResponse> for WarehouseCheckedCancelHandler {
    async fn handle(&self, envelope: Envelope<StatusResponse>) -> Outcome {
        let StatusResponse { order_id, status } = envelope.body;

        let target = if status {
            OrderStatus::Canceled
        } else {
            OrderStatus::OrderCancelPaymentRecharging
        };
        let mutated = match self
            .saga
            .try_transition_from(order_id, OrderStatus::OrderCancelWarehousePending, target)
            .await
        {
            Ok(mutated) => mutated,
            Err(err) => return storage_failure(order_id, &err),
        };
        if !mutated || status {
            return Outcome::Ack;
        }

        let order = match self.saga.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return Outcome::Drop,
            Err(err) => return storage_failure(order_id, &err),
        };
        if let Err(err) = self
            .saga
            .publish_payment_revert_cancel(order_id, &order.client_id)
            .await
        {
            return storage_failure(order_id, &err);
        }
        Outcome::Ack
    }
}

/// `payment.reverted_cancel`: compensation step 1 done, ask delivery to
/// revert too.
pub struct PaymentRevertedCancelHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<OrderRef> for PaymentRevertedCancelHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        let mutated = match self
            .saga
            .try_transition_from(
                order_id,
                OrderStatus::OrderCancelPaymentRecharging,
                OrderStatus::OrderCancelDeliveryRedelivering,
            )
            .await
        {
            Ok(mutated) => mutated,
            Err(err) => return storage_failure(order_id, &err),
        };
        if !mutated {
            return Outcome::Ack;
        }
        if let Err(err) = self.saga.publish_delivery_revert_cancel(order_id).await {
            return storage_failure(order_id, &err);
        }
        Outcome::Ack
    }
}

/// `delivery.reverted_cancel`: compensation complete, the order is back
/// to `Queued`.
pub struct DeliveryRevertedCancelHandler {
    pub saga: Arc<OrderSaga>,
}

#[async_trait]
impl Handler<OrderRef> for DeliveryRevertedCancelHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        match self
            .saga
            .try_transition_from(
                order_id,
                OrderStatus::OrderCancelDeliveryRedelivering,
                OrderStatus::Queued,
            )
            .await
        {
            Ok(_) => Outcome::Ack,
            Err(err) => storage_failure(order_id, &err),
        }
    }
}

/// `warehouse.order_canceled`: a secondary notification carrying the
/// same information as `warehouse.checked_cancel`; acknowledged without
/// mutation since `WarehouseCheckedCancelHandler` already drove the
/// transition.
pub struct WarehouseOrderCanceledHandler;

#[async_trait]
impl Handler<OrderRef> for WarehouseOrderCanceledHandler {
    async fn handle(&self, _envelope: Envelope<OrderRef>) -> Outcome {
        Outcome::Ack
    }
}
