//! Server entry point.

use std::sync::Arc;

use api::AppState;
use common::Config;
use fulfillment::services::shipping::{HttpShippingClient, ShippingClient};
use fulfillment::services::source::{HttpOrderSourceClient, OrderSourceClient};
use fulfillment::DeliveryReconciler;
use order_store::SqliteOrderStore;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Load configuration
    let config = Arc::new(Config::from_env());
    if config.source_token.is_none() {
        tracing::warn!("SOURCE_API_TOKEN is not set, order source calls will fail");
    }
    if config.carrier_token.is_none() {
        tracing::warn!("CARRIER_API_TOKEN is not set, shipping provider calls will fail");
    }
    tracing::info!(
        carrier = %config.carrier,
        mode = %config.shipment_mode,
        database_url = %config.database_url,
        "configuration loaded"
    );

    // 4. Open the order store
    let store = SqliteOrderStore::connect(&config.database_url)
        .await
        .expect("failed to open order store");

    // 5. Build the outbound clients on one shared HTTP client
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .expect("failed to build HTTP client");
    let shipping: Arc<dyn ShippingClient> =
        Arc::new(HttpShippingClient::new(http.clone(), config.clone()));
    let source: Arc<dyn OrderSourceClient> =
        Arc::new(HttpOrderSourceClient::new(http, config.clone()));

    // 6. Start the delivery reconciler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = DeliveryReconciler::new(
        store.clone(),
        shipping.clone(),
        source.clone(),
        config.clone(),
    );
    let reconciler_task = tokio::spawn(async move { reconciler.run(shutdown_rx).await });

    // 7. Build and start the server
    let state = Arc::new(AppState::new(store, shipping, source, config.clone()));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 8. Stop the reconciler and wait for it
    let _ = shutdown_tx.send(true);
    let _ = reconciler_task.await;

    tracing::info!("server shut down gracefully");
}
