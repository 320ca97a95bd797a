//! The orchestrator's HTTP surface (spec.md §6): order creation,
//! retrieval, cancellation, admin update, saga history, and the
//! catalog. Grounded on the pack's axum `State`/`Router` convention.

use crate::error::OrchestratorError;
use crate::orchestrator::{CreateOrderRequest, OrderSaga};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use forgemesh_saga::{Order, OrderStatus, SagaEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub fn build_router(saga: Arc<OrderSaga>) -> Router {
    Router::new()
        .route("/create_order", post(create_order))
        .route("/order/retrieve/:order_id", get(retrieve_order))
        .route("/order/cancel/:order_id", post(cancel_order))
        .route("/order/update/:order_id", put(update_order))
        .route("/order/sagashistory/:order_id", get(saga_history))
        .route("/order/catalog", get(catalog))
        .with_state(saga)
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotCancelable { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateOrderBody {
    client_id: String,
    count_a: u32,
    count_b: u32,
    description: String,
}

#[derive(Debug, Serialize)]
struct OrderResponse {
    order_id: Uuid,
    client_id: String,
    count_a: u32,
    count_b: u32,
    description: String,
    status: OrderStatus,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            client_id: order.client_id,
            count_a: order.count_a,
            count_b: order.count_b,
            description: order.description,
            status: order.status,
        }
    }
}

async fn create_order(
    State(saga): State<Arc<OrderSaga>>,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), OrchestratorError> {
    let order = saga
        .create_order(CreateOrderRequest {
            client_id: body.client_id,
            count_a: body.count_a,
            count_b: body.count_b,
            description: body.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn retrieve_order(
    State(saga): State<Arc<OrderSaga>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrchestratorError> {
    let order = saga
        .get_order(order_id)
        .await?
        .ok_or(OrchestratorError::OrderNotFound(order_id))?;
    Ok(Json(order.into()))
}

/// `POST /order/cancel/{order_id}`: `200` if the cancellation saga was
/// launched, `409` if the order is past the reclaimable `Queued` stage.
async fn cancel_order(
    State(saga): State<Arc<OrderSaga>>,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, OrchestratorError> {
    let order = saga
        .get_order(order_id)
        .await?
        .ok_or(OrchestratorError::OrderNotFound(order_id))?;
    if saga.cancel_order(order_id).await? {
        Ok(StatusCode::OK)
    } else {
        Err(OrchestratorError::NotCancelable {
            order_id,
            status: order.status.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UpdateOrderBody {
    description: Option<String>,
}

/// `PUT /order/update/{order_id}`: an admin-only partial update,
/// limited to the order's free-text description — the counts and
/// status are owned exclusively by the saga once an order exists.
async fn update_order(
    State(saga): State<Arc<OrderSaga>>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<UpdateOrderBody>,
) -> Result<Json<OrderResponse>, OrchestratorError> {
    let order = saga
        .update_description(order_id, body.description)
        .await?;
    Ok(Json(order.into()))
}

async fn saga_history(
    State(saga): State<Arc<OrderSaga>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<SagaEntry>>, OrchestratorError> {
    Ok(Json(saga.history(order_id).await?))
}

#[derive(Debug, Serialize)]
struct CatalogEntry {
    piece_type: String,
    price: f64,
}

async fn catalog(
    State(saga): State<Arc<OrderSaga>>,
) -> Result<Json<Vec<CatalogEntry>>, OrchestratorError> {
    let entries = saga
        .catalog
        .list()
        .await?
        .into_iter()
        .map(|(piece_type, price)| CatalogEntry {
            piece_type: piece_type.to_string(),
            price: price.as_decimal(),
        })
        .collect();
    Ok(Json(entries))
}
