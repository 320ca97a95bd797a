//! Delivery participant process (spec.md §4.4).

use anyhow::Result;
use forgemesh_bus::{BusAdapter, Exchange, run_consumer};
use forgemesh_common::{BusConfig, StorageConfig, init_tracing};
use forgemesh_delivery::{
    AddressBook, CancelHandler, CheckCancelHandler, CheckHandler, ClientAddressHandler,
    DeliveryStore, OrdersProducedHandler, RevertCancelHandler,
};
use std::sync::Arc;
use tracing::info;

const MAX_REDELIVERIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("delivery");

    let bus_config = BusConfig::from_env();
    let storage_config = StorageConfig::from_env("FORGEMESH_DELIVERY_DB", "./data/delivery.db");

    let bus = Arc::new(BusAdapter::connect(bus_config).await?);
    let addresses = Arc::new(AddressBook::connect(&storage_config.database_url).await?);
    let deliveries = Arc::new(DeliveryStore::connect(&storage_config.database_url).await?);

    info!("delivery participant starting");

    let check = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "delivery.check",
        MAX_REDELIVERIES,
        Arc::new(CheckHandler {
            addresses: Arc::clone(&addresses),
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));
    let produced = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.produced",
        MAX_REDELIVERIES,
        Arc::new(OrdersProducedHandler {
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));
    let cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "delivery.cancel",
        MAX_REDELIVERIES,
        Arc::new(CancelHandler {
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));
    let check_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "delivery.check_cancel",
        MAX_REDELIVERIES,
        Arc::new(CheckCancelHandler {
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));
    let revert_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "delivery.revert_cancel",
        MAX_REDELIVERIES,
        Arc::new(RevertCancelHandler {
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));
    let client_created = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "client.created",
        MAX_REDELIVERIES,
        Arc::new(ClientAddressHandler {
            addresses: Arc::clone(&addresses),
        }),
    ));
    let client_updated = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "client.updated",
        MAX_REDELIVERIES,
        Arc::new(ClientAddressHandler {
            addresses: Arc::clone(&addresses),
        }),
    ));

    forgemesh_common::shutdown_signal().await;
    info!("delivery participant shutting down");
    check.abort();
    produced.abort();
    cancel.abort();
    check_cancel.abort();
    revert_cancel.abort();
    client_created.abort();
    client_updated.abort();
    Ok(())
}
