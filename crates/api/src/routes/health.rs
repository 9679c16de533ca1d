//! Health check and service status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use order_store::{OrderStore, StoreStats};
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::webhook::AppState;

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub status: &'static str,
    pub carrier: String,
    pub shipment_mode: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub carrier: String,
    pub shipment_mode: &'static str,
    pub source_token_configured: bool,
    pub carrier_token_configured: bool,
    pub orders: StoreStats,
}

/// GET / — basic service identification.
pub async fn index<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "order-fulfillment-bridge",
        status: "running",
        carrier: state.config.carrier.to_string(),
        shipment_mode: state.config.shipment_mode.as_str(),
    })
}

/// GET /health — credentials and store health.
///
/// `degraded` means the service is up but at least one API token is
/// missing, so outbound calls will fail.
pub async fn check<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let orders = state.store.stats().await?;
    let status = if state.config.credentials_present() {
        "healthy"
    } else {
        "degraded"
    };

    Ok(Json(HealthResponse {
        status,
        carrier: state.config.carrier.to_string(),
        shipment_mode: state.config.shipment_mode.as_str(),
        source_token_configured: state.config.source_token.is_some(),
        carrier_token_configured: state.config.carrier_token.is_some(),
        orders,
    }))
}
