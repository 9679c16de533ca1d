//! In-memory order store implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use domain::OrderStatus;
use tokio::sync::RwLock;

use crate::record::{OrderPatch, OrderRecord, StoreStats};
use crate::store::OrderStore;
use crate::Result;

/// In-memory order store with the same merge semantics as the SQLite
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, OrderRecord>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns true when no orders are stored.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn upsert(&self, patch: OrderPatch) -> Result<OrderRecord> {
        let now = Utc::now();
        let mut orders = self.orders.write().await;
        let record = orders
            .entry(patch.order_id.clone())
            .and_modify(|existing| existing.apply(&patch, now))
            .or_insert_with(|| OrderRecord::from_patch(&patch, now));
        Ok(record.clone())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn get_status(&self, order_id: &OrderId) -> Result<Option<OrderStatus>> {
        Ok(self.orders.read().await.get(order_id).map(|r| r.status))
    }

    async fn list_awaiting_delivery(&self, max_retries: u32) -> Result<Vec<OrderRecord>> {
        let orders = self.orders.read().await;
        let mut backlog: Vec<OrderRecord> = orders
            .values()
            .filter(|record| record.is_awaiting_delivery(max_retries))
            .cloned()
            .collect();
        backlog.sort_by_key(|record| record.updated_at);
        Ok(backlog)
    }

    async fn list(&self, status: Option<OrderStatus>, limit: usize) -> Result<Vec<OrderRecord>> {
        let orders = self.orders.read().await;
        let mut records: Vec<OrderRecord> = orders
            .values()
            .filter(|record| status.is_none_or(|s| record.status == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let orders = self.orders.read().await;
        let mut stats = StoreStats::default();
        for record in orders.values() {
            *stats
                .by_status
                .entry(record.status.as_str().to_string())
                .or_insert(0) += 1;
            stats.total += 1;
        }
        Ok(stats)
    }
}
