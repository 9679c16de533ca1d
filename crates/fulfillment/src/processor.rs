//! Inbound order event processing.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{Config, OrderId, ShipmentMode};
use domain::{OrderEvent, OrderStatus, ShipmentRequest, synthesize_tracking_code};
use metrics::{counter, histogram};
use order_store::{OrderPatch, OrderSnapshot, OrderStore};
use serde_json::Value;

use crate::error::{FulfillmentError, IngestError};
use crate::retry::RetryPolicy;
use crate::services::shipping::ShippingClient;
use crate::services::source::OrderSourceClient;

/// What happened to an inbound order event.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The order is not invoiced yet; nothing was done.
    Skipped {
        order_id: OrderId,
        order_code: Option<String>,
        fulfillment_status: Option<String>,
    },
    /// The order already went out; the event is a duplicate.
    AlreadyProcessed {
        order_id: OrderId,
        status: OrderStatus,
    },
    /// The shipment was registered with the provider; a label is still
    /// pending there.
    Forwarded {
        order_id: OrderId,
        order_code: String,
        carrier_order_id: Option<String>,
    },
    /// The order was quoted, labeled with a synthesized tracking code,
    /// and marked shipped at the source.
    Shipped {
        order_id: OrderId,
        order_code: String,
        tracking_code: String,
    },
}

/// Drives an inbound order event through the gate, the idempotency
/// check, and the configured shipment mode.
pub struct IngestProcessor<S: OrderStore> {
    store: S,
    shipping: Arc<dyn ShippingClient>,
    source: Arc<dyn OrderSourceClient>,
    retry: RetryPolicy,
    config: Arc<Config>,
}

impl<S: OrderStore> IngestProcessor<S> {
    pub fn new(
        store: S,
        shipping: Arc<dyn ShippingClient>,
        source: Arc<dyn OrderSourceClient>,
        config: Arc<Config>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            store,
            shipping,
            source,
            retry,
            config,
        }
    }

    /// Processes one raw webhook payload.
    ///
    /// Structural problems (no order id) surface as [`IngestError::Event`].
    /// A failure past the invoiced gate is recorded against the order
    /// before being returned, so failed orders stay visible in the store.
    #[tracing::instrument(skip(self, raw))]
    pub async fn process(&self, raw: Value) -> Result<IngestOutcome, IngestError> {
        let started = Instant::now();
        let event = OrderEvent::parse(raw)?;

        if !event.is_invoiced() {
            tracing::info!(
                order_id = %event.order_id,
                fulfillment_status = event.fulfillment_status.as_deref().unwrap_or("-"),
                "order skipped, not invoiced"
            );
            counter!("orders_ingested_total", "outcome" => "skipped").increment(1);
            return Ok(IngestOutcome::Skipped {
                order_id: event.order_id,
                order_code: event.order_code,
                fulfillment_status: event.fulfillment_status,
            });
        }

        if let Some(status) = self.store.get_status(&event.order_id).await?
            && status.is_already_processed()
        {
            tracing::info!(order_id = %event.order_id, %status, "order already processed");
            counter!("orders_ingested_total", "outcome" => "already_processed").increment(1);
            return Ok(IngestOutcome::AlreadyProcessed {
                order_id: event.order_id,
                status,
            });
        }

        match self.forward(&event).await {
            Ok(outcome) => {
                counter!("orders_ingested_total", "outcome" => "forwarded").increment(1);
                histogram!("ingest_duration_seconds").record(started.elapsed().as_secs_f64());
                Ok(outcome)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::error!(order_id = %event.order_id, error = %message, "order processing failed");
                counter!("orders_ingested_total", "outcome" => "failed").increment(1);
                self.store
                    .upsert(
                        OrderPatch::new(event.order_id.clone())
                            .status(OrderStatus::Error)
                            .error(message.clone()),
                    )
                    .await?;
                Err(IngestError::Processing {
                    order_id: event.order_id,
                    message,
                })
            }
        }
    }

    async fn forward(&self, event: &OrderEvent) -> Result<IngestOutcome, FulfillmentError> {
        let request = ShipmentRequest::from_event(event, &self.config)?;
        let mut snapshot = OrderSnapshot::from_event(event);

        match self.config.shipment_mode {
            ShipmentMode::CreateShipment => {
                let reference = self
                    .retry
                    .run("create_shipment", || {
                        self.shipping.create_shipment(&request)
                    })
                    .await?;

                // The provider's own order id is needed later to match
                // tracking updates back to this order; keep it with the
                // stored payload.
                if let Some(carrier_order_id) = &reference.carrier_order_id
                    && let Some(Value::Object(payload)) = snapshot.payload.as_mut()
                {
                    payload.insert(
                        "carrier_order_id".to_string(),
                        Value::String(carrier_order_id.clone()),
                    );
                }

                self.store
                    .upsert(
                        OrderPatch::new(event.order_id.clone())
                            .status(OrderStatus::Pending)
                            .snapshot(snapshot),
                    )
                    .await?;

                counter!("shipments_created_total").increment(1);
                tracing::info!(
                    order_id = %event.order_id,
                    order_code = %request.order_code,
                    "shipment registered, awaiting label"
                );

                Ok(IngestOutcome::Forwarded {
                    order_id: event.order_id.clone(),
                    order_code: request.order_code,
                    carrier_order_id: reference.carrier_order_id,
                })
            }
            ShipmentMode::QuoteLabel => {
                self.retry
                    .run("quote_shipment", || self.shipping.quote_shipment(&request))
                    .await?;

                let tracking_code = synthesize_tracking_code(
                    &self.config.carrier_code,
                    &request.order_code,
                    Utc::now(),
                );

                self.retry
                    .run("mark_shipped", || {
                        self.source.mark_shipped(
                            &event.order_id,
                            &tracking_code,
                            &self.config.carrier_name,
                        )
                    })
                    .await?;

                self.store
                    .upsert(
                        OrderPatch::new(event.order_id.clone())
                            .status(OrderStatus::Shipped)
                            .tracking_code(tracking_code.clone())
                            .snapshot(snapshot),
                    )
                    .await?;

                counter!("shipments_created_total").increment(1);
                tracing::info!(
                    order_id = %event.order_id,
                    order_code = %request.order_code,
                    tracking_code = %tracking_code,
                    "order quoted and marked shipped"
                );

                Ok(IngestOutcome::Shipped {
                    order_id: event.order_id.clone(),
                    order_code: request.order_code,
                    tracking_code,
                })
            }
        }
    }
}
