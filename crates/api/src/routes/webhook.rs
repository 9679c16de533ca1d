//! Webhook ingestion endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::{Config, OrderId};
use fulfillment::services::shipping::ShippingClient;
use fulfillment::services::source::OrderSourceClient;
use fulfillment::{IngestOutcome, IngestProcessor};
use order_store::OrderStore;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub processor: IngestProcessor<S>,
    pub store: S,
    pub config: Arc<Config>,
}

impl<S: OrderStore + Clone> AppState<S> {
    pub fn new(
        store: S,
        shipping: Arc<dyn ShippingClient>,
        source: Arc<dyn OrderSourceClient>,
        config: Arc<Config>,
    ) -> Self {
        let processor = IngestProcessor::new(store.clone(), shipping, source, config.clone());
        Self {
            processor,
            store,
            config,
        }
    }
}

// -- Response types --

#[derive(Serialize)]
#[serde(untagged)]
pub enum WebhookResponse {
    Skipped {
        message: &'static str,
        order_id: OrderId,
        order_code: Option<String>,
        fulfillment_status: Option<String>,
        required: &'static str,
    },
    AlreadyProcessed {
        message: &'static str,
        order_id: OrderId,
        status: String,
    },
    Forwarded {
        success: bool,
        message: &'static str,
        order_id: OrderId,
        order_code: String,
        carrier_order_id: Option<String>,
        next_steps: &'static str,
    },
    Shipped {
        success: bool,
        message: &'static str,
        order_id: OrderId,
        order_code: String,
        tracking_code: String,
    },
}

impl From<IngestOutcome> for WebhookResponse {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Skipped {
                order_id,
                order_code,
                fulfillment_status,
            } => WebhookResponse::Skipped {
                message: "Order ignored, only invoiced orders are processed",
                order_id,
                order_code,
                fulfillment_status,
                required: "invoiced",
            },
            IngestOutcome::AlreadyProcessed { order_id, status } => {
                WebhookResponse::AlreadyProcessed {
                    message: "Order already processed",
                    order_id,
                    status: status.to_string(),
                }
            }
            IngestOutcome::Forwarded {
                order_id,
                order_code,
                carrier_order_id,
            } => WebhookResponse::Forwarded {
                success: true,
                message: "Order registered with the shipping provider",
                order_id,
                order_code,
                carrier_order_id,
                next_steps: "Generate the label in the provider panel",
            },
            IngestOutcome::Shipped {
                order_id,
                order_code,
                tracking_code,
            } => WebhookResponse::Shipped {
                success: true,
                message: "Order quoted and marked as shipped",
                order_id,
                order_code,
                tracking_code,
            },
        }
    }
}

// -- Handlers --

/// POST /webhook (alias POST /order) — ingest one order event.
#[tracing::instrument(skip(state, payload))]
pub async fn receive<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(payload): Json<Value>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let outcome = state.processor.process(payload).await?;
    Ok(Json(outcome.into()))
}
