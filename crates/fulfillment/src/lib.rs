//! Fulfillment orchestration.
//!
//! Turns incoming order events into carrier shipments, keeps the local
//! order store up to date, and reconciles tracking status back to the
//! order source. HTTP integrations live behind traits in [`services`]
//! with in-memory doubles for testing.

pub mod error;
pub mod processor;
pub mod reconciler;
pub mod retry;
pub mod services;

pub use error::{FulfillmentError, IngestError};
pub use processor::{IngestOutcome, IngestProcessor};
pub use reconciler::{CycleSummary, DeliveryReconciler};
pub use retry::RetryPolicy;
pub use services::shipping::{
    CarrierReference, HttpShippingClient, InMemoryShippingClient, RateQuote, ShippingClient,
    TrackingStatus,
};
pub use services::source::{HttpOrderSourceClient, InMemoryOrderSource, OrderSourceClient};
