//! Domain error types.

use thiserror::Error;

/// Structural problems with an inbound order event.
#[derive(Debug, Error)]
pub enum EventError {
    /// The payload was not a JSON object.
    #[error("order event payload is not a JSON object")]
    NotAnObject,

    /// The order id field is missing or empty.
    #[error("order event is missing an order id")]
    MissingOrderId,

    /// The payload could not be deserialized.
    #[error("malformed order event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Validation failures while building a shipment request.
///
/// These are reported immediately, without retries or external calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShipmentError {
    /// No delivery address on the order.
    #[error("delivery address not found on order")]
    MissingAddress,

    /// No customer record on the order.
    #[error("customer data not found on order")]
    MissingCustomer,
}
