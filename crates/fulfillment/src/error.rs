//! Fulfillment error types.

use common::OrderId;
use domain::{EventError, ShipmentError};
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur while talking to carriers and the order source.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The order event is missing data required to build a shipment.
    #[error("Invalid shipment data: {0}")]
    Validation(String),

    /// Required configuration is absent.
    #[error("Missing configuration: {0}")]
    Configuration(&'static str),

    /// The shipping provider rejected the request.
    #[error("Shipping provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    /// The order source API rejected the request.
    #[error("Order source returned {status}: {body}")]
    Source { status: u16, body: String },

    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The service is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl FulfillmentError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Validation and configuration problems are permanent; anything
    /// that crossed the network may clear up on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Source { .. } | Self::Http(_) | Self::Unavailable(_)
        )
    }
}

impl From<ShipmentError> for FulfillmentError {
    fn from(err: ShipmentError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Errors surfaced to the webhook caller during event ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The incoming payload could not be parsed as an order event.
    #[error("Invalid order event: {0}")]
    Event(#[from] EventError),

    /// The order was understood but could not be forwarded.
    #[error("Failed to process order {order_id}: {message}")]
    Processing { order_id: OrderId, message: String },

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
