//! Integration tests for the full ingest-to-delivery flow.

use std::sync::Arc;
use std::time::Duration;

use common::{Config, OrderId, ShipmentMode};
use domain::OrderStatus;
use fulfillment::{
    DeliveryReconciler, IngestOutcome, IngestProcessor, InMemoryOrderSource,
    InMemoryShippingClient,
};
use order_store::{InMemoryOrderStore, OrderStore};
use serde_json::json;

struct TestHarness {
    store: InMemoryOrderStore,
    shipping: Arc<InMemoryShippingClient>,
    source: Arc<InMemoryOrderSource>,
    processor: IngestProcessor<InMemoryOrderStore>,
    reconciler: DeliveryReconciler<InMemoryOrderStore>,
}

impl TestHarness {
    fn new(mode: ShipmentMode) -> Self {
        let config = Arc::new(Config {
            shipment_mode: mode,
            retry_delay: Duration::ZERO,
            ..Config::default()
        });
        let store = InMemoryOrderStore::new();
        let shipping = Arc::new(InMemoryShippingClient::new());
        let source = Arc::new(InMemoryOrderSource::new());

        let processor = IngestProcessor::new(
            store.clone(),
            shipping.clone(),
            source.clone(),
            config.clone(),
        );
        let reconciler =
            DeliveryReconciler::new(store.clone(), shipping.clone(), source.clone(), config)
                .with_order_pause(Duration::ZERO);

        Self {
            store,
            shipping,
            source,
            processor,
            reconciler,
        }
    }

    fn payload(&self, id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "code": format!("ORD-{id}"),
            "fulfillment_status": "invoiced",
            "customer": {"name": "Bruno Silva", "cpf": "123.456.789-00",
                         "phone": "(11) 98888-7777", "email": "bruno@example.com"},
            "address": {"zipcode": "01310-100", "street": "Av. Paulista", "number": "1000",
                        "district": "Bela Vista", "city": "São Paulo", "state": "SP"},
            "items": [{"sku": "A-1", "name": "Mug", "quantity": 2, "price": 75.0, "weight": 500}],
            "total": 150.0,
            "shipping_cost": 22.5
        })
    }
}

#[tokio::test]
async fn quote_mode_order_reaches_delivered_end_to_end() {
    let h = TestHarness::new(ShipmentMode::QuoteLabel);

    let outcome = h.processor.process(h.payload("10")).await.unwrap();
    let IngestOutcome::Shipped { tracking_code, .. } = outcome else {
        panic!("expected shipped outcome");
    };

    // Not delivered yet; the first cycle writes nothing.
    let summary = h.reconciler.run_cycle().await;
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.delivered, 0);

    h.shipping.set_tracking_status(&tracking_code, "Objeto entregue");
    let summary = h.reconciler.run_cycle().await;
    assert_eq!(summary.delivered, 1);

    let record = h.store.get(&OrderId::new("10")).await.unwrap().unwrap();
    assert_eq!(record.status, OrderStatus::Delivered);
    assert!(h.source.was_marked_delivered(&OrderId::new("10")));

    // Delivered orders leave the backlog for good.
    let summary = h.reconciler.run_cycle().await;
    assert_eq!(summary.checked, 0);
}

#[tokio::test]
async fn create_mode_orders_stay_out_of_the_backlog_until_tracked() {
    let h = TestHarness::new(ShipmentMode::CreateShipment);

    h.processor.process(h.payload("10")).await.unwrap();
    assert_eq!(h.shipping.shipment_count(), 1);

    // Pending without a tracking code; nothing to reconcile.
    let summary = h.reconciler.run_cycle().await;
    assert_eq!(summary.checked, 0);
}

#[tokio::test]
async fn duplicate_webhooks_produce_one_shipment() {
    let h = TestHarness::new(ShipmentMode::QuoteLabel);

    h.processor.process(h.payload("10")).await.unwrap();
    let second = h.processor.process(h.payload("10")).await.unwrap();

    assert!(matches!(second, IngestOutcome::AlreadyProcessed { .. }));
    assert_eq!(h.shipping.quote_count(), 1);
    assert_eq!(h.source.shipped_count(), 1);
}

#[tokio::test]
async fn failed_ingest_is_visible_and_recoverable() {
    let h = TestHarness::new(ShipmentMode::CreateShipment);
    h.shipping.set_fail_on_create(true);

    h.processor.process(h.payload("10")).await.unwrap_err();
    let record = h.store.get(&OrderId::new("10")).await.unwrap().unwrap();
    assert_eq!(record.status, OrderStatus::Error);
    assert!(record.last_error.is_some());

    h.shipping.set_fail_on_create(false);
    let outcome = h.processor.process(h.payload("10")).await.unwrap();
    assert!(matches!(outcome, IngestOutcome::Forwarded { .. }));

    let record = h.store.get(&OrderId::new("10")).await.unwrap().unwrap();
    assert_eq!(record.status, OrderStatus::Pending);
    assert!(record.last_error.is_none());
}

#[tokio::test]
async fn mixed_backlog_is_processed_independently() {
    let h = TestHarness::new(ShipmentMode::QuoteLabel);

    for id in ["10", "11", "12"] {
        h.processor.process(h.payload(id)).await.unwrap();
    }

    let records = h.store.list(None, 100).await.unwrap();
    let tracking: Vec<String> = records
        .iter()
        .filter_map(|r| r.tracking_code.clone())
        .collect();
    assert_eq!(tracking.len(), 3);

    h.shipping.set_tracking_status(&tracking[0], "Delivered");
    h.shipping.set_tracking_status(&tracking[1], "aguardando coleta");

    let summary = h.reconciler.run_cycle().await;
    assert_eq!(summary.checked, 3);
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.failed, 0);
}
