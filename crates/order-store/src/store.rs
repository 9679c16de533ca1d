//! The order store trait.

use async_trait::async_trait;
use common::OrderId;
use domain::OrderStatus;

use crate::record::{OrderPatch, OrderRecord, StoreStats};
use crate::Result;

/// Durable keyed repository of orders.
///
/// All mutation goes through [`upsert`](OrderStore::upsert): a single
/// atomic operation per order, serialized per key, so readers never
/// observe a half-written record. The store never retries; persistence
/// failures surface to callers, who treat them as non-fatal.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts or merges one order. Merge semantics are field-level
    /// keep-if-absent (see [`OrderRecord::apply`]); `updated_at` is
    /// bumped on every call. Returns the resulting record.
    async fn upsert(&self, patch: OrderPatch) -> Result<OrderRecord>;

    /// Loads a record by external order id.
    async fn get(&self, order_id: &OrderId) -> Result<Option<OrderRecord>>;

    /// Returns the current status of an order, if known.
    async fn get_status(&self, order_id: &OrderId) -> Result<Option<OrderStatus>>;

    /// Returns all records awaiting delivery confirmation: status in
    /// {created, pending, shipped}, a usable tracking code, and
    /// `retry_count < max_retries`; ordered by `updated_at` ascending
    /// so the oldest-checked order rotates to the front.
    async fn list_awaiting_delivery(&self, max_retries: u32) -> Result<Vec<OrderRecord>>;

    /// Lists recent records, newest first, optionally filtered by status.
    async fn list(&self, status: Option<OrderStatus>, limit: usize) -> Result<Vec<OrderRecord>>;

    /// Returns a count per status plus the total. Observability only,
    /// never decision logic.
    async fn stats(&self) -> Result<StoreStats>;
}
