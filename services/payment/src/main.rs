//! Payment participant process: binds the three payment command
//! routing keys on the `commands` exchange and serves them with
//! prefetch=1 (spec.md §4.2, §4.7).

use anyhow::Result;
use forgemesh_bus::{BusAdapter, Exchange, run_consumer};
use forgemesh_common::{BusConfig, StorageConfig, init_tracing};
use forgemesh_payment::{CheckCancelHandler, CheckHandler, PaymentLedger, RevertCancelHandler};
use std::sync::Arc;
use tracing::info;

const MAX_REDELIVERIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("payment");

    let bus_config = BusConfig::from_env();
    let storage_config = StorageConfig::from_env("FORGEMESH_PAYMENT_DB", "./data/payment.db");

    let bus = Arc::new(BusAdapter::connect(bus_config).await?);
    let ledger = Arc::new(PaymentLedger::connect(&storage_config.database_url).await?);

    info!("payment participant starting");

    let check = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "payment.check",
        MAX_REDELIVERIES,
        Arc::new(CheckHandler {
            ledger: Arc::clone(&ledger),
            bus: Arc::clone(&bus),
        }),
    ));
    let check_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "payment.check_cancel",
        MAX_REDELIVERIES,
        Arc::new(CheckCancelHandler {
            ledger: Arc::clone(&ledger),
            bus: Arc::clone(&bus),
        }),
    ));
    let revert_cancel = tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "payment.revert_cancel",
        MAX_REDELIVERIES,
        Arc::new(RevertCancelHandler {
            ledger: Arc::clone(&ledger),
            bus: Arc::clone(&bus),
        }),
    ));

    forgemesh_common::shutdown_signal().await;
    info!("payment participant shutting down");
    check.abort();
    check_cancel.abort();
    revert_cancel.abort();
    Ok(())
}
