//! Fabrication process: one worker task per piece type (spec.md §4.5).

use anyhow::Result;
use forgemesh_bus::{BusAdapter, Exchange, run_consumer};
use forgemesh_common::{BusConfig, PieceType, init_tracing};
use forgemesh_fabrication::{FabricationWorker, MachineRegistry};
use std::sync::Arc;
use tracing::info;

const MAX_REDELIVERIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("fabrication");

    let bus_config = BusConfig::from_env();
    let bus = Arc::new(BusAdapter::connect(bus_config).await?);
    let registry = Arc::new(MachineRegistry::new());

    info!("fabrication workers starting");

    let worker_a = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "piece_a.requested",
        MAX_REDELIVERIES,
        Arc::new(FabricationWorker {
            piece_type: PieceType::A,
            registry: Arc::clone(&registry),
            bus: Arc::clone(&bus),
        }),
    ));
    let worker_b = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "piece_b.requested",
        MAX_REDELIVERIES,
        Arc::new(FabricationWorker {
            piece_type: PieceType::B,
            registry: Arc::clone(&registry),
            bus: Arc::clone(&bus),
        }),
    ));

    forgemesh_common::shutdown_signal().await;
    info!("fabrication workers shutting down");
    worker_a.abort();
    worker_b.abort();
    Ok(())
}
