//! Background delivery reconciliation.
//!
//! Periodically walks the backlog of orders that went out but were not
//! yet confirmed delivered, asks the shipping provider for their
//! tracking status, and pushes confirmed deliveries back to the order
//! source. One order's failure never stops the cycle, and a failed
//! cycle never stops the loop.

use std::sync::Arc;
use std::time::Duration;

use common::Config;
use domain::OrderStatus;
use metrics::counter;
use order_store::{OrderPatch, OrderRecord, OrderStore};
use tokio::sync::watch;

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::services::shipping::ShippingClient;
use crate::services::source::OrderSourceClient;

const DEFAULT_ORDER_PAUSE: Duration = Duration::from_secs(2);

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleSummary {
    /// Orders found in the backlog.
    pub checked: usize,
    /// Orders confirmed delivered this cycle.
    pub delivered: usize,
    /// Orders whose check or notification failed.
    pub failed: usize,
}

/// Polls tracking status for shipped orders and confirms deliveries.
pub struct DeliveryReconciler<S: OrderStore> {
    store: S,
    shipping: Arc<dyn ShippingClient>,
    source: Arc<dyn OrderSourceClient>,
    retry: RetryPolicy,
    interval: Duration,
    order_pause: Duration,
    /// Retry ceiling for backlog selection. Twice the ingest budget, so
    /// orders that failed during ingest still get checked a few times
    /// before they are parked.
    backlog_retry_cap: u32,
}

impl<S: OrderStore> DeliveryReconciler<S> {
    pub fn new(
        store: S,
        shipping: Arc<dyn ShippingClient>,
        source: Arc<dyn OrderSourceClient>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            shipping,
            source,
            retry: RetryPolicy::from_config(&config),
            interval: config.tracker_interval,
            order_pause: DEFAULT_ORDER_PAUSE,
            backlog_retry_cap: config.max_retries.saturating_mul(2),
        }
    }

    /// Overrides the pause between per-order tracking queries.
    pub fn with_order_pause(mut self, pause: Duration) -> Self {
        self.order_pause = pause;
        self
    }

    /// Runs reconciliation cycles until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "delivery reconciler started"
        );

        loop {
            let summary = self.run_cycle().await;
            if summary.checked > 0 {
                tracing::info!(
                    checked = summary.checked,
                    delivered = summary.delivered,
                    failed = summary.failed,
                    "reconciliation cycle finished"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("delivery reconciler stopped");
    }

    /// Runs one reconciliation cycle over the current backlog.
    pub async fn run_cycle(&self) -> CycleSummary {
        let backlog = match self.store.list_awaiting_delivery(self.backlog_retry_cap).await {
            Ok(backlog) => backlog,
            Err(err) => {
                tracing::error!(error = %err, "failed to load delivery backlog");
                return CycleSummary::default();
            }
        };

        let mut summary = CycleSummary {
            checked: backlog.len(),
            ..CycleSummary::default()
        };

        for (idx, record) in backlog.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.order_pause).await;
            }

            match self.check_order(record).await {
                Ok(true) => summary.delivered += 1,
                Ok(false) => {}
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        order_id = %record.order_id,
                        error = %err,
                        "delivery check failed"
                    );
                    // Annotate the failure without touching the status.
                    let patch = OrderPatch::new(record.order_id.clone()).error(err.to_string());
                    if let Err(store_err) = self.store.upsert(patch).await {
                        tracing::error!(
                            order_id = %record.order_id,
                            error = %store_err,
                            "failed to record delivery check failure"
                        );
                    }
                }
            }
        }

        counter!("reconciliation_cycles_total").increment(1);
        counter!("deliveries_confirmed_total").increment(summary.delivered as u64);
        summary
    }

    async fn check_order(&self, record: &OrderRecord) -> Result<bool> {
        let Some(tracking_code) = record.tracking_code.as_deref() else {
            return Ok(false);
        };

        let status = self.shipping.tracking_status(tracking_code).await?;
        if !status.is_delivered() {
            tracing::debug!(
                order_id = %record.order_id,
                tracking_code,
                status = %status.raw,
                "not delivered yet"
            );
            return Ok(false);
        }

        self.retry
            .run("mark_delivered", || {
                self.source.mark_delivered(&record.order_id)
            })
            .await?;

        self.store
            .upsert(OrderPatch::new(record.order_id.clone()).status(OrderStatus::Delivered))
            .await?;

        tracing::info!(
            order_id = %record.order_id,
            tracking_code,
            "delivery confirmed"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use common::OrderId;
    use order_store::InMemoryOrderStore;

    use super::*;
    use crate::services::shipping::InMemoryShippingClient;
    use crate::services::source::InMemoryOrderSource;

    struct Harness {
        store: InMemoryOrderStore,
        shipping: Arc<InMemoryShippingClient>,
        source: Arc<InMemoryOrderSource>,
        reconciler: DeliveryReconciler<InMemoryOrderStore>,
    }

    fn harness() -> Harness {
        let config = Arc::new(Config {
            tracker_interval: Duration::from_millis(10),
            retry_delay: Duration::ZERO,
            ..Config::default()
        });
        let store = InMemoryOrderStore::new();
        let shipping = Arc::new(InMemoryShippingClient::new());
        let source = Arc::new(InMemoryOrderSource::new());
        let reconciler =
            DeliveryReconciler::new(store.clone(), shipping.clone(), source.clone(), config)
                .with_order_pause(Duration::ZERO);
        Harness {
            store,
            shipping,
            source,
            reconciler,
        }
    }

    async fn shipped_order(store: &InMemoryOrderStore, id: &str, tracking: &str) {
        store
            .upsert(
                OrderPatch::new(OrderId::new(id))
                    .status(OrderStatus::Shipped)
                    .tracking_code(tracking),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delivered_orders_are_confirmed() {
        let h = harness();
        shipped_order(&h.store, "10", "TRK-1").await;
        h.shipping.set_tracking_status("TRK-1", "Objeto entregue ao destinatário");

        let summary = h.reconciler.run_cycle().await;
        assert_eq!(summary, CycleSummary { checked: 1, delivered: 1, failed: 0 });
        assert!(h.source.was_marked_delivered(&OrderId::new("10")));

        let record = h.store.get(&OrderId::new("10")).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Delivered);
        assert!(record.delivered_at.is_some());
    }

    #[tokio::test]
    async fn undelivered_orders_are_left_alone() {
        let h = harness();
        shipped_order(&h.store, "10", "TRK-1").await;

        let summary = h.reconciler.run_cycle().await;
        assert_eq!(summary, CycleSummary { checked: 1, delivered: 0, failed: 0 });
        assert_eq!(h.source.delivered_count(), 0);

        let record = h.store.get(&OrderId::new("10")).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Shipped);
        assert_eq!(record.retry_count, 0);
    }

    #[tokio::test]
    async fn tracking_failure_preserves_status_and_counts_a_retry() {
        let h = harness();
        shipped_order(&h.store, "10", "TRK-1").await;
        h.shipping.set_fail_on_tracking(true);

        let summary = h.reconciler.run_cycle().await;
        assert_eq!(summary.failed, 1);

        let record = h.store.get(&OrderId::new("10")).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Shipped);
        assert_eq!(record.retry_count, 1);
        assert!(record.last_error.is_some());
    }

    #[tokio::test]
    async fn one_failing_order_does_not_stop_the_cycle() {
        let h = harness();
        shipped_order(&h.store, "10", "TRK-1").await;
        shipped_order(&h.store, "11", "TRK-2").await;
        h.shipping.set_tracking_status("TRK-1", "weird broken status");
        h.shipping.set_tracking_status("TRK-2", "Delivered");
        h.source.fail_next_delivered(u32::MAX);

        // First order is undelivered, second delivers but the source
        // notification keeps failing.
        let summary = h.reconciler.run_cycle().await;
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.failed, 1);

        let record = h.store.get(&OrderId::new("11")).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn source_notification_retries_then_confirms() {
        let h = harness();
        shipped_order(&h.store, "10", "TRK-1").await;
        h.shipping.set_tracking_status("TRK-1", "Delivered");
        h.source.fail_next_delivered(2);

        let summary = h.reconciler.run_cycle().await;
        assert_eq!(summary.delivered, 1);
        assert_eq!(h.source.delivered_count(), 1);
    }

    #[tokio::test]
    async fn orders_past_the_retry_cap_are_parked() {
        let h = harness();
        shipped_order(&h.store, "10", "TRK-1").await;
        h.shipping.set_fail_on_tracking(true);

        // Default budget is 3 ingest retries, so the backlog cap is 6.
        for _ in 0..6 {
            h.reconciler.run_cycle().await;
        }
        let summary = h.reconciler.run_cycle().await;
        assert_eq!(summary.checked, 0);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let h = harness();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { h.reconciler.run(rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reconciler did not stop")
            .unwrap();
    }
}
