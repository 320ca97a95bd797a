//! Orchestrator process (spec.md §4.1, §6): saga state machine plus
//! the platform's HTTP surface, wired to the bus's three exchanges.

use anyhow::Result;
use forgemesh_bus::{BusAdapter, Exchange, run_consumer};
use forgemesh_common::{BusConfig, StorageConfig, init_tracing};
use forgemesh_orchestrator::{
    Catalog, DeliveryCanceledHandler, DeliveryCheckedCancelHandler, DeliveryCheckedHandler,
    DeliveryRevertedCancelHandler, OrderSaga, OrderStore, OrdersDeliveredHandler,
    OrdersDeliveringHandler, OrdersProducedHandler, PaymentCheckedCancelHandler,
    PaymentCheckedHandler, PaymentRevertedCancelHandler, WarehouseCheckedCancelHandler,
    WarehouseOrderCanceledHandler, build_router,
};
use forgemesh_saga::SagaLog;
use std::sync::Arc;
use tracing::info;

const MAX_REDELIVERIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("orchestrator");

    let bus_config = BusConfig::from_env();
    let storage_config =
        StorageConfig::from_env("FORGEMESH_ORCHESTRATOR_DB", "./data/orchestrator.db");
    let http_addr = std::env::var("FORGEMESH_ORCHESTRATOR_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let bus = Arc::new(BusAdapter::connect(bus_config).await?);
    let orders = Arc::new(OrderStore::connect(&storage_config.database_url).await?);
    let saga_log = Arc::new(SagaLog::connect(&storage_config.database_url).await?);
    let catalog = Arc::new(Catalog::connect(&storage_config.database_url).await?);
    let saga = Arc::new(OrderSaga::new(
        Arc::clone(&orders),
        Arc::clone(&saga_log),
        Arc::clone(&catalog),
        Arc::clone(&bus),
    ));

    info!("orchestrator starting");

    let delivery_checked = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "delivery.checked",
        MAX_REDELIVERIES,
        Arc::new(DeliveryCheckedHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let payment_checked = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "payment.checked",
        MAX_REDELIVERIES,
        Arc::new(PaymentCheckedHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let delivery_canceled = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "delivery.canceled",
        MAX_REDELIVERIES,
        Arc::new(DeliveryCanceledHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let orders_produced = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.produced",
        MAX_REDELIVERIES,
        Arc::new(OrdersProducedHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let orders_delivering = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.delivering",
        MAX_REDELIVERIES,
        Arc::new(OrdersDeliveringHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let orders_delivered = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.delivered",
        MAX_REDELIVERIES,
        Arc::new(OrdersDeliveredHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let delivery_checked_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "delivery.checked_cancel",
        MAX_REDELIVERIES,
        Arc::new(DeliveryCheckedCancelHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let payment_checked_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "payment.checked_cancel",
        MAX_REDELIVERIES,
        Arc::new(PaymentCheckedCancelHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let warehouse_checked_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "warehouse.checked_cancel",
        MAX_REDELIVERIES,
        Arc::new(WarehouseCheckedCancelHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let payment_reverted_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "payment.reverted_cancel",
        MAX_REDELIVERIES,
        Arc::new(PaymentRevertedCancelHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let delivery_reverted_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "delivery.reverted_cancel",
        MAX_REDELIVERIES,
        Arc::new(DeliveryRevertedCancelHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    let warehouse_order_canceled = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "warehouse.order_canceled",
        MAX_REDELIVERIES,
        Arc::new(WarehouseOrderCanceledHandler),
    ));

    let router = build_router(Arc::clone(&saga));
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!(addr = %http_addr, "orchestrator http surface listening");
    let server = tokio::spawn(async move { axum::serve(listener, router).await });

    forgemesh_common::shutdown_signal().await;
    info!("orchestrator shutting down");
    delivery_checked.abort();
    payment_checked.abort();
    delivery_canceled.abort();
    orders_produced.abort();
    orders_delivering.abort();
    orders_delivered.abort();
    delivery_checked_cancel.abort();
    payment_checked_cancel.abort();
    warehouse_checked_cancel.abort();
    payment_reverted_cancel.abort();
    delivery_reverted_cancel.abort();
    warehouse_order_canceled.abort();
    server.abort();
    Ok(())
}
