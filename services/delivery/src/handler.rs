//! Command/event handlers for the delivery participant (spec.md §4.4).

use crate::address_book::{AddressBook, ClientAddress};
use crate::store::{DeliveryStatus, DeliveryStore, DeliveryStoreError};
use async_trait::async_trait;
use forgemesh_bus::{BusAdapter, Envelope, Exchange, Handler, Outcome};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const MIN_SHIPPING_SECS: f64 = 1.0;
const MAX_SHIPPING_SECS: f64 = 3.0;

#[derive(Debug, Deserialize)]
pub struct OrderClientRef {
    #[serde(alias = "id_order")]
    order_id: Uuid,
    client_id: String,
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

/// `delivery.check`: consult the address book's feasibility predicate
/// and create the delivery row.
pub struct CheckHandler {
    pub addresses: Arc<AddressBook>,
    pub deliveries: Arc<DeliveryStore>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<OrderClientRef> for CheckHandler {
    async fn handle(&self, envelope: Envelope<OrderClientRef>) -> Outcome {
        let OrderClientRef {
            order_id,
            client_id,
        } = envelope.body;

        let feasible = match self.addresses.get(&client_id).await {
            Ok(Some(address)) => AddressBook::is_feasible(address.zip_code),
            Ok(None) => false,
            Err(err) => {
                warn!(%order_id, %err, "delivery.check address lookup failed");
                return Outcome::Retry;
            }
        };

        let status = if feasible {
            DeliveryStatus::Created
        } else {
            DeliveryStatus::Canceled
        };
        if let Err(err) = self.deliveries.create(order_id, &client_id, status).await {
            warn!(%order_id, %err, "delivery.check storage error");
            return Outcome::Retry;
        }

        info!(%order_id, feasible, "delivery.check processed");
        let response = CheckedResponse {
            order_id,
            status: feasible,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "delivery.checked", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish delivery.checked");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}

/// `orders.produced`: ship unless already canceled, emitting
/// `orders.delivering` then, after a simulated shipping interval,
/// `orders.delivered`.
pub struct OrdersProducedHandler {
    pub deliveries: Arc<DeliveryStore>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<OrderRef> for OrdersProducedHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;

        match self.deliveries.status(order_id).await {
            Ok(Some(DeliveryStatus::Canceled)) => return Outcome::Ack,
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(%order_id, "orders.produced for a delivery with no check on record");
                return Outcome::Drop;
            }
            Err(err) => {
                warn!(%order_id, %err, "orders.produced status lookup failed");
                return Outcome::Retry;
            }
        }

        if let Err(err) = self
            .deliveries
            .set_status(order_id, DeliveryStatus::Delivering)
            .await
        {
            warn!(%order_id, %err, "failed to mark delivery Delivering");
            return Outcome::Retry;
        }
        if let Err(err) = self
            .bus
            .publish(Exchange::Events, "orders.delivering", &OrderRefOut { order_id })
            .await
        {
            warn!(%order_id, %err, "failed to publish orders.delivering");
            return Outcome::Retry;
        }

        let shipping_secs = rand::thread_rng().gen_range(MIN_SHIPPING_SECS..=MAX_SHIPPING_SECS);
        tokio::time::sleep(Duration::from_secs_f64(shipping_secs)).await;

        if let Err(err) = self
            .deliveries
            .set_status(order_id, DeliveryStatus::Delivered)
            .await
        {
            warn!(%order_id, %err, "failed to mark delivery Delivered");
            return Outcome::Retry;
        }
        if let Err(err) = self
            .bus
            .publish(Exchange::Events, "orders.delivered", &OrderRefOut { order_id })
            .await
        {
            warn!(%order_id, %err, "failed to publish orders.delivered");
            return Outcome::Retry;
        }
        info!(%order_id, "order delivered");
        Outcome::Ack
    }
}

#[derive(Debug, Serialize)]
struct OrderRefOut {
    order_id: Uuid,
}

/// `delivery.cancel`: unconditionally cancel.
pub struct CancelHandler {
    pub deliveries: Arc<DeliveryStore>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<OrderRef> for CancelHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        if let Err(err) = self
            .deliveries
            .set_status(order_id, DeliveryStatus::Canceled)
            .await
        {
            warn!(%order_id, %err, "delivery.cancel storage error");
            return Outcome::Retry;
        }
        let response = CheckedResponse {
            order_id,
            status: true,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "delivery.canceled", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish delivery.canceled");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}

/// `delivery.check_cancel`: only admissible while still `Created`.
pub struct CheckCancelHandler {
    pub deliveries: Arc<DeliveryStore>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<OrderRef> for CheckCancelHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;

        let current = match self.deliveries.status(order_id).await {
            Ok(status) => status,
            Err(err) => {
                warn!(%order_id, %err, "delivery.check_cancel status lookup failed");
                return Outcome::Retry;
            }
        };

        let admissible = current == Some(DeliveryStatus::Created);
        if admissible {
            if let Err(err) = self
                .deliveries
                .set_status(order_id, DeliveryStatus::Canceled)
                .await
            {
                warn!(%order_id, %err, "delivery.check_cancel storage error");
                return Outcome::Retry;
            }
        }

        info!(%order_id, admissible, "delivery.check_cancel processed");
        let response = CheckedResponse {
            order_id,
            status: admissible,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "delivery.checked_cancel", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish delivery.checked_cancel");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}

/// `delivery.revert_cancel`: compensation, restores `Created`.
pub struct RevertCancelHandler {
    pub deliveries: Arc<DeliveryStore>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<OrderRef> for RevertCancelHandler {
    async fn handle(&self, envelope: Envelope<OrderRef>) -> Outcome {
        let order_id = envelope.body.order_id;
        match self
            .deliveries
            .set_status(order_id, DeliveryStatus::Created)
            .await
        {
            Ok(()) => {}
            Err(DeliveryStoreError::NotFound(_)) => return Outcome::Drop,
            Err(err) => {
                warn!(%order_id, %err, "delivery.revert_cancel storage error");
                return Outcome::Retry;
            }
        }
        let response = CheckedResponse {
            order_id,
            status: true,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "delivery.reverted_cancel", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish delivery.reverted_cancel");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientEvent {
    client_id: String,
    address: String,
    zip_code: u32,
}

/// `client.created` / `client.updated`: replicate into the local
/// address book.
pub struct ClientAddressHandler {
    pub addresses: Arc<AddressBook>,
}

#[async_trait]
impl Handler<ClientEvent> for ClientAddressHandler {
    async fn handle(&self, envelope: Envelope<ClientEvent>) -> Outcome {
        let ClientEvent {
            client_id,
            address,
            zip_code,
        } = envelope.body;

        if let Err(err) = self
            .addresses
            .replicate(&ClientAddress {
                client_id: client_id.clone(),
                address,
                zip_code,
            })
            .await
        {
            warn!(%client_id, %err, "failed to replicate client address");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}
