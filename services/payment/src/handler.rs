//! Command handlers for the payment participant (spec.md §4.2).

use crate::ledger::PaymentLedger;
use async_trait::async_trait;
use forgemesh_bus::{BusAdapter, Envelope, Exchange, Handler, Outcome};
use forgemesh_common::Money;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CheckPayload {
    #[serde(alias = "id_order")]
    order_id: Uuid,
    client_id: String,
    movement: f64,
}

#[derive(Debug, Deserialize)]
pub struct RevertCancelPayload {
    #[serde(alias = "id_order")]
    order_id: Uuid,
    client_id: String,
}

#[derive(Debug, Serialize)]
struct CheckedResponse {
    order_id: Uuid,
    status: bool,
}

/// `payment.check`: debit/credit and reply `payment.checked`.
pub struct CheckHandler {
    pub ledger: Arc<PaymentLedger>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<CheckPayload> for CheckHandler {
    async fn handle(&self, envelope: Envelope<CheckPayload>) -> Outcome {
        let CheckPayload {
            order_id,
            client_id,
            movement,
        } = envelope.body;

        let applied = match self
            .ledger
            .check(&client_id, order_id, Money::from_decimal(movement))
            .await
        {
            Ok(applied) => applied,
            Err(err) => {
                warn!(%order_id, %err, "payment.check storage error");
                return Outcome::Retry;
            }
        };

        info!(%order_id, %client_id, movement, applied, "payment.check processed");
        let response = CheckedResponse {
            order_id,
            status: applied,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "payment.checked", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish payment.checked");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}

/// `payment.check_cancel`: apply a credit and reply `payment.checked_cancel`.
pub struct CheckCancelHandler {
    pub ledger: Arc<PaymentLedger>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<CheckPayload> for CheckCancelHandler {
    async fn handle(&self, envelope: Envelope<CheckPayload>) -> Outcome {
        let CheckPayload {
            order_id,
            client_id,
            movement,
        } = envelope.body;

        if let Err(err) = self
            .ledger
            .check_cancel(&client_id, order_id, Money::from_decimal(movement))
            .await
        {
            warn!(%order_id, %err, "payment.check_cancel storage error");
            return Outcome::Retry;
        }

        info!(%order_id, %client_id, movement, "payment.check_cancel applied");
        let response = CheckedResponse {
            order_id,
            status: true,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "payment.checked_cancel", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish payment.checked_cancel");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}

/// `payment.revert_cancel`: undo the matching `check_cancel` and reply
/// `payment.reverted_cancel`.
pub struct RevertCancelHandler {
    pub ledger: Arc<PaymentLedger>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<RevertCancelPayload> for RevertCancelHandler {
    async fn handle(&self, envelope: Envelope<RevertCancelPayload>) -> Outcome {
        let RevertCancelPayload {
            order_id,
            client_id,
        } = envelope.body;

        match self.ledger.revert_cancel(&client_id, order_id).await {
            Ok(reverted) => {
                info!(%order_id, %client_id, %reverted, "payment.revert_cancel applied");
            }
            Err(crate::ledger::PaymentError::NoCancelToRevert { .. }) => {
                // State-machine violation (spec.md §7 kind 3): log and ack.
                warn!(%order_id, %client_id, "no check_cancel movement to revert");
                return Outcome::Drop;
            }
            Err(err) => {
                warn!(%order_id, %err, "payment.revert_cancel storage error");
                return Outcome::Retry;
            }
        }

        let response = CheckedResponse {
            order_id,
            status: true,
        };
        if let Err(err) = self
            .bus
            .publish(Exchange::Responses, "payment.reverted_cancel", &response)
            .await
        {
            warn!(%order_id, %err, "failed to publish payment.reverted_cancel");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}
