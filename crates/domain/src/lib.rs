//! Domain layer for the fulfillment bridge: the order status state
//! machine, normalized inbound order events, and shipment request
//! construction.

pub mod error;
pub mod event;
pub mod shipment;
pub mod status;

pub use error::{EventError, ShipmentError};
pub use event::{Address, Customer, OrderEvent, OrderItem, INVOICED};
pub use shipment::{
    synthesize_tracking_code, ShipmentItem, ShipmentRequest, PACKAGE_HEIGHT_CM, PACKAGE_LENGTH_CM,
    PACKAGE_WIDTH_CM,
};
pub use status::OrderStatus;
