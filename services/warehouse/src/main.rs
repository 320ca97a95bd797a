//! Warehouse participant process: consumes `warehouse.requested` and
//! `piece.produced` events, `warehouse.check_cancel` commands, and
//! `orders.delivering` events (spec.md §4.3, §4.7).

use anyhow::Result;
use forgemesh_bus::{BusAdapter, Exchange, run_consumer};
use forgemesh_common::{BusConfig, StorageConfig, init_tracing};
use forgemesh_warehouse::{
    CheckCancelHandler, Inventory, OrderDeliveringHandler, PieceProducedHandler, RequestedHandler,
};
use std::sync::Arc;
use tracing::info;

const MAX_REDELIVERIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warehouse");

    let bus_config = BusConfig::from_env();
    let storage_config = StorageConfig::from_env("FORGEMESH_WAREHOUSE_DB", "./data/warehouse.db");

    let bus = Arc::new(BusAdapter::connect(bus_config).await?);
    let inventory = Arc::new(Inventory::connect(&storage_config.database_url).await?);

    info!("warehouse participant starting");

    let requested = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "warehouse.requested",
        MAX_REDELIVERIES,
        Arc::new(RequestedHandler {
            inventory: Arc::clone(&inventory),
            bus: Arc::clone(&bus),
        }),
    ));
    let piece_produced = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "piece.produced",
        MAX_REDELIVERIES,
        Arc::new(PieceProducedHandler {
            inventory: Arc::clone(&inventory),
            bus: Arc::clone(&bus),
        }),
    ));
    let check_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "warehouse.check_cancel",
        MAX_REDELIVERIES,
        Arc::new(CheckCancelHandler {
            inventory: Arc::clone(&inventory),
            bus: Arc::clone(&bus),
        }),
    ));
    let delivering = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.delivering",
        MAX_REDELIVERIES,
        Arc::new(OrderDeliveringHandler {
            inventory: Arc::clone(&inventory),
        }),
    ));

    forgemesh_common::shutdown_signal().await;
    info!("warehouse participant shutting down");
    requested.abort();
    piece_produced.abort();
    check_cancel.abort();
    delivering.abort();
    Ok(())
}
