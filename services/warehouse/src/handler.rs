//! Event/command handlers for the warehouse participant (spec.md §4.3).

use crate::inventory::Inventory;
use async_trait::async_trait;
use forgemesh_bus::{BusAdapter, Envelope, Exchange, Handler, Outcome};
use forgemesh_common::PieceType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WarehouseRequested {
    #[serde(alias = "id_order")]
    order_id: Uuid,
    client_id: String,
    count_a: u32,
    count_b: u32,
}

#[derive(Debug, Serialize)]
struct PieceRequested {
    order_id: Uuid,
    piece_id: Uuid,
}

#[derive(Debug, Serialize)]
struct OrdersProduced {
    order_id: Uuid,
}

/// `warehouse.requested` (event): reserve or fabricate every requested
/// piece, then emit `orders.produced` once the order is fully covered.
pub struct RequestedHandler {
    pub inventory: Arc<Inventory>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<WarehouseRequested> for RequestedHandler {
    async fn handle(&self, envelope: Envelope<WarehouseRequested>) -> Outcome {
        let WarehouseRequested {
            order_id,
            client_id,
            count_a,
            count_b,
        } = envelope.body;

        let mut any_queued = false;
        for (piece_type, count) in [(PieceType::A, count_a), (PieceType::B, count_b)] {
            if count == 0 {
                continue;
            }
            let outcome = match self
                .inventory
                .reserve_or_queue(order_id, &client_id, piece_type, count)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(%order_id, %err, "warehouse.requested storage error");
                    return Outcome::Retry;
                }
            };

            for piece_id in outcome.queued_piece_ids {
                any_queued = true;
                let routing_key = format!("piece_{}.requested", piece_type.routing_token());
                let payload = PieceRequested { order_id, piece_id };
                if let Err(err) = self
                    .bus
                    .publish(Exchange::Events, &routing_key, &payload)
                    .await
                {
                    warn!(%order_id, %err, "failed to publish {routing_key}");
                    return Outcome::Retry;
                }
            }
        }

        if !any_queued {
            return publish_orders_produced(&self.bus, order_id).await;
        }
        Outcome::Ack
    }
}

#[derive(Debug, Deserialize)]
pub struct PieceProduced {
    #[serde(alias = "id_order")]
    order_id: Uuid,
    piece_id: Uuid,
}

/// `piece.produced` (event): mark the piece produced; if it was the
/// order's last outstanding piece, emit `orders.produced`.
pub struct PieceProducedHandler {
    pub inventory: Arc<Inventory>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<PieceProduced> for PieceProducedHandler {
    async fn handle(&self, envelope: Envelope<PieceProduced>) -> Outcome {
        let PieceProduced { order_id, piece_id } = envelope.body;

        if let Err(err) = self.inventory.mark_produced(piece_id).await {
            warn!(%order_id, %piece_id, %err, "piece.produced storage error");
            return Outcome::Retry;
        }

        match self.inventory.all_pieces_produced(order_id).await {
            Ok(true) => publish_orders_produced(&self.bus, order_id).await,
            Ok(false) => Outcome::Ack,
            Err(err) => {
                warn!(%order_id, %err, "failed to check order completion");
                Outcome::Retry
            }
        }
    }
}

async fn publish_orders_produced(bus: &BusAdapter, order_id: Uuid) -> Outcome {
    let payload = OrdersProduced { order_id };
    if let Err(err) = bus.publish(Exchange::Events, "orders.produced", &payload).await {
        warn!(%order_id, %err, "failed to publish orders.produced");
        return Outcome::Retry;
    }
    info!(%order_id, "orders.produced emitted");
    Outcome::Ack
}

#[derive(Debug, Deserialize)]
pub struct OrderRef {
    #[serde(alias = "id_order")]
    order_id: Uuid,
}

#[derive(Debug, Serialize)]
struct CheckedResponse {
    order_id: Uuid,
    status: bool,
}

/// `warehouse.check_cancel` (command): release every piece of the
/// order unless one has already shipped.
pub struct CheckCancelHandler {
    pub inventory: Arc<Inventory>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<OrderRef> for CheckCancelHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;

        let released = match self.inventory.release_order(order_id).await {
            Ok(released) => released,
            Err(err) => {
                warn!(%order_id, %err, "warehouse.check_cancel storage error");
                return Outcome::Retry;
            }
        };

        info!(%order_id, released, "warehouse.check_cancel processed");
        let response = CheckedResponse {
            order_id,
            status: released,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "warehouse.checked_cancel", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish warehouse.checked_cancel");
            return Outcome::Retry;
        }

        if released {
            if let Err(err) = self
                .bus
                .publish(Exchange::Responses, "warehouse.order_canceled", &response)
                .await
            {
                warn!(%order_id, %err, "failed to publish warehouse.order_canceled");
                return Outcome::Retry;
            }
        }
        Outcome::Ack
    }
}

/// `orders.delivering` (event): every piece of the order ships.
pub struct OrderDeliveringHandler {
    pub inventory: Arc<Inventory>,
}

#[async_trait]
impl Handler<OrderRef> for OrderDeliveringHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        if let Err(err) = self.inventory.mark_order_shipped(order_id).await {
            warn!(%order_id, %err, "orders.delivering storage error");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}
