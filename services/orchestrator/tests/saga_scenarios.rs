//! End-to-end saga scenarios (spec.md §8): the orchestrator wired to a
//! live bus and every participant crate, exercising the same command/
//! response/event flow a deployed platform would run.

use forgemesh_bus::{BusAdapter, Exchange, run_consumer};
use forgemesh_common::{BusConfig, Money, PieceType};
use forgemesh_delivery::{
    AddressBook, CancelHandler as DeliveryCancelHandler, CheckHandler as DeliveryCheckHandler,
    ClientAddress, DeliveryStore, OrdersProducedHandler as DeliveryOrdersProducedHandler,
};
use forgemesh_fabrication::{FabricationWorker, MachineRegistry};
use forgemesh_orchestrator::{
    Catalog, CreateOrderRequest, DeliveryCanceledHandler, DeliveryCheckedHandler,
    OrderSaga, OrderStore, OrdersDeliveredHandler, OrdersDeliveringHandler,
    OrdersProducedHandler, PaymentCheckedHandler,
};
use forgemesh_payment::{CheckHandler as PaymentCheckHandler, PaymentLedger};
use forgemesh_saga::{OrderStatus, SagaLog};
use forgemesh_warehouse::{
    Inventory, OrderDeliveringHandler as WarehouseOrderDeliveringHandler,
    PieceProducedHandler, RequestedHandler,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_REDELIVERIES: u32 = 3;

struct Harness {
    saga: Arc<OrderSaga>,
    ledger: Arc<PaymentLedger>,
    addresses: Arc<AddressBook>,
    deliveries: Arc<DeliveryStore>,
}

async fn spawn_stack() -> Harness {
    let log_dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(
        BusAdapter::connect(BusConfig {
            durable_log_dir: log_dir.path().to_string_lossy().to_string(),
            prefetch: 1,
        })
        .await
        .unwrap(),
    );

    let orders = Arc::new(OrderStore::connect("sqlite::memory:").await.unwrap());
    let saga_log = Arc::new(SagaLog::connect("sqlite::memory:").await.unwrap());
    let catalog = Arc::new(Catalog::connect("sqlite::memory:").await.unwrap());
    let saga = Arc::new(OrderSaga::new(
        Arc::clone(&orders),
        Arc::clone(&saga_log),
        Arc::clone(&catalog),
        Arc::clone(&bus),
    ));

    let ledger = Arc::new(PaymentLedger::connect("sqlite::memory:").await.unwrap());
    let addresses = Arc::new(AddressBook::connect("sqlite::memory:").await.unwrap());
    let deliveries = Arc::new(DeliveryStore::connect("sqlite::memory:").await.unwrap());
    let inventory = Arc::new(Inventory::connect("sqlite::memory:").await.unwrap());
    let registry = Arc::new(MachineRegistry::new());

    // Orchestrator response/event handlers.
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "delivery.checked",
        MAX_REDELIVERIES,
        Arc::new(DeliveryCheckedHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "payment.checked",
        MAX_REDELIVERIES,
        Arc::new(PaymentCheckedHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Responses,
        "delivery.canceled",
        MAX_REDELIVERIES,
        Arc::new(DeliveryCanceledHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.produced",
        MAX_REDELIVERIES,
        Arc::new(OrdersProducedHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.delivering",
        MAX_REDELIVERIES,
        Arc::new(OrdersDeliveringHandler {
            saga: Arc::clone(&saga),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.delivered",
        MAX_REDELIVERIES,
        Arc::new(OrdersDeliveredHandler {
            saga: Arc::clone(&saga),
        }),
    ));

    // Delivery participant.
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "delivery.check",
        MAX_REDELIVERIES,
        Arc::new(DeliveryCheckHandler {
            addresses: Arc::clone(&addresses),
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "delivery.cancel",
        MAX_REDELIVERIES,
        Arc::new(DeliveryCancelHandler {
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.produced",
        MAX_REDELIVERIES,
        Arc::new(DeliveryOrdersProducedHandler {
            deliveries: Arc::clone(&deliveries),
            bus: Arc::clone(&bus),
        }),
    ));

    // Payment participant.
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Commands,
        "payment.check",
        MAX_REDELIVERIES,
        Arc::new(PaymentCheckHandler {
            ledger: Arc::clone(&ledger),
            bus: Arc::clone(&bus),
        }),
    ));

    // Warehouse participant.
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "warehouse.requested",
        MAX_REDELIVERIES,
        Arc::new(RequestedHandler {
            inventory: Arc::clone(&inventory),
            bus: Arc::clone(&bus),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "piece.produced",
        MAX_REDELIVERIES,
        Arc::new(PieceProducedHandler {
            inventory: Arc::clone(&inventory),
            bus: Arc::clone(&bus),
        }),
    ));
    tokio::spawn(run_consumer(
        Arc::clone(&bus),
        Exchange::Events,
        "orders.delivering",
        MAX_REDELIVERIES,
        Arc::new(WarehouseOrderDeliveringHandler {
            inventory: Arc::clone(&inventory),
        }),
    ));

    // Fabrication workers.
    tokio::spawn(run_consumer(
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
    tokio::spawn(run_consumer(
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

    Harness {
        saga,
        ledger,
        addresses,
        deliveries,
    }
}

async fn wait_for_status(saga: &OrderSaga, order_id: Uuid, target: OrderStatus) -> OrderStatus {
    for _ in 0..200 {
        let order = saga.get_order(order_id).await.unwrap().unwrap();
        if order.status == target {
            return order.status;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    saga.get_order(order_id).await.unwrap().unwrap().status
}

async fn place_order(saga: &OrderSaga, client_id: &str) -> Uuid {
    saga.create_order(CreateOrderRequest {
        client_id: client_id.to_string(),
        count_a: 2,
        count_b: 1,
        description: "two A one B".to_string(),
    })
    .await
    .unwrap()
    .order_id
}

/// Scenario 1 (spec.md §8): happy path. The saga runs end to end and
/// the client is charged `3.00*2 + 5.00*1 = 11.00` against a `100.00`
/// starting balance.
#[tokio::test]
async fn happy_path_delivers_and_charges_total_cost() {
    let harness = spawn_stack().await;
    let client_id = "client-7";

    harness
        .addresses
        .replicate(&ClientAddress {
            client_id: client_id.to_string(),
            address: "20500 Main St".to_string(),
            zip_code: 20500,
        })
        .await
        .unwrap();
    harness
        .ledger
        .check_cancel(client_id, Uuid::new_v4(), Money::from_decimal(100.00))
        .await
        .unwrap();

    let order_id = place_order(&harness.saga, client_id).await;

    let status = wait_for_status(&harness.saga, order_id, OrderStatus::Delivered).await;
    assert_eq!(status, OrderStatus::Delivered);
    assert_eq!(
        harness.ledger.balance(client_id).await.unwrap(),
        Money::from_decimal(89.00)
    );
    assert_eq!(
        harness.deliveries.status(order_id).await.unwrap(),
        Some(forgemesh_delivery::DeliveryStatus::Delivered)
    );
}

/// Scenario 2 (spec.md §8): insufficient funds stops the saga at
/// `DeliveryCanceling -> Canceled` and leaves the balance untouched.
#[tokio::test]
async fn insufficient_funds_cancels_without_charging() {
    let harness = spawn_stack().await;
    let client_id = "client-poor";

    harness
        .addresses
        .replicate(&ClientAddress {
            client_id: client_id.to_string(),
            address: "20500 Main St".to_string(),
            zip_code: 20500,
        })
        .await
        .unwrap();
    harness
        .ledger
        .check_cancel(client_id, Uuid::new_v4(), Money::from_decimal(5.00))
        .await
        .unwrap();

    let order_id = place_order(&harness.saga, client_id).await;

    let status = wait_for_status(&harness.saga, order_id, OrderStatus::Canceled).await;
    assert_eq!(status, OrderStatus::Canceled);
    assert_eq!(
        harness.ledger.balance(client_id).await.unwrap(),
        Money::from_decimal(5.00)
    );
}

/// Scenario 3 (spec.md §8): an infeasible delivery address cancels the
/// order before any payment is attempted.
#[tokio::test]
async fn bad_address_cancels_before_payment() {
    let harness = spawn_stack().await;
    let client_id = "client-unreachable";

    harness
        .addresses
        .replicate(&ClientAddress {
            client_id: client_id.to_string(),
            address: "28000 Nowhere Rd".to_string(),
            zip_code: 28000,
        })
        .await
        .unwrap();
    harness
        .ledger
        .check_cancel(client_id, Uuid::new_v4(), Money::from_decimal(100.00))
        .await
        .unwrap();

    let order_id = place_order(&harness.saga, client_id).await;

    let status = wait_for_status(&harness.saga, order_id, OrderStatus::Canceled).await;
    assert_eq!(status, OrderStatus::Canceled);
    assert_eq!(
        harness.ledger.balance(client_id).await.unwrap(),
        Money::from_decimal(100.00)
    );
}
