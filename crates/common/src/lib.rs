//! Shared types and configuration for the fulfillment bridge.

pub mod config;
pub mod types;

pub use config::{Carrier, Config, ShipmentMode};
pub use types::OrderId;
