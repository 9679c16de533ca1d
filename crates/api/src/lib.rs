//! HTTP server bridging order webhooks to the shipping provider.
//!
//! Receives order-invoiced events over a webhook, forwards them through
//! the fulfillment processor, and exposes order state, health, and
//! Prometheus metrics.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::webhook::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(routes::health::index::<S>))
        .route("/webhook", post(routes::webhook::receive::<S>))
        .route("/order", post(routes::webhook::receive::<S>))
        .route("/health", get(routes::health::check::<S>))
        .route("/stats", get(routes::orders::stats::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
