//! Durable keyed record of orders and their fulfillment status.
//!
//! All persistence invariants live here: unique key per external order
//! id, forward-only status progression, and field-level keep-if-absent
//! merge semantics, implemented once in [`record`] and shared by both
//! backends.

pub mod error;
pub mod memory;
pub mod record;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use record::{OrderPatch, OrderRecord, OrderSnapshot, StoreStats, NO_TRACKING};
pub use sqlite::SqliteOrderStore;
pub use store::OrderStore;
