//! SQLite-backed order store implementation.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Address, Customer, OrderStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::record::{OrderPatch, OrderRecord, StoreStats};
use crate::store::OrderStore;
use crate::{Result, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    external_order_id   TEXT PRIMARY KEY,
    order_code          TEXT,
    status              TEXT NOT NULL DEFAULT 'created',
    tracking_code       TEXT,
    customer_name       TEXT,
    customer_document   TEXT,
    customer_email      TEXT,
    customer_phone      TEXT,
    address_zipcode     TEXT,
    address_street      TEXT,
    address_number      TEXT,
    address_complement  TEXT,
    address_district    TEXT,
    address_city        TEXT,
    address_state       TEXT,
    total_value         REAL,
    shipping_cost       REAL,
    payload_json        TEXT,
    retry_count         INTEGER NOT NULL DEFAULT 0,
    last_error          TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    delivered_at        TEXT
);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
CREATE INDEX IF NOT EXISTS idx_orders_tracking ON orders(tracking_code);
"#;

/// SQLite-backed order store.
///
/// The merge rule lives in [`OrderRecord::apply`]; each upsert is a
/// read-merge-write inside one transaction. Writes are single-flight
/// behind a store-level lock: a deferred transaction that read before
/// writing would otherwise fail its lock upgrade with SQLITE_BUSY when
/// another writer got there first, instead of serializing. With the
/// lock, concurrent upserts for the same order queue up and the final
/// row always reflects one coherent merge.
#[derive(Clone)]
pub struct SqliteOrderStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteOrderStore {
    /// Opens (creating if missing) the database at `url` and ensures
    /// the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // An in-memory database exists per connection; keep exactly one.
        let max_connections = if url.contains(":memory:") || url.contains("mode=memory") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::debug!("order store schema ready");
        Ok(())
    }

    fn row_to_record(row: SqliteRow) -> Result<OrderRecord> {
        let status_raw: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::InvalidStatus(status_raw))?;

        let customer = Customer {
            name: row.try_get("customer_name")?,
            document: row.try_get("customer_document")?,
            email: row.try_get("customer_email")?,
            phone: row.try_get("customer_phone")?,
        };
        let customer = (customer != Customer::default()).then_some(customer);

        let address = Address {
            zipcode: row.try_get("address_zipcode")?,
            street: row.try_get("address_street")?,
            number: row.try_get("address_number")?,
            complement: row.try_get("address_complement")?,
            district: row.try_get("address_district")?,
            city: row.try_get("address_city")?,
            state: row.try_get("address_state")?,
        };
        let address = (address != Address::default()).then_some(address);

        let payload = row
            .try_get::<Option<String>, _>("payload_json")?
            .map(|json| serde_json::from_str(&json))
            .transpose()?;

        let retry_count: i64 = row.try_get("retry_count")?;

        Ok(OrderRecord {
            order_id: OrderId::new(row.try_get::<String, _>("external_order_id")?),
            order_code: row.try_get("order_code")?,
            status,
            tracking_code: row.try_get("tracking_code")?,
            customer,
            address,
            total_value: row.try_get("total_value")?,
            shipping_cost: row.try_get("shipping_cost")?,
            payload,
            retry_count: retry_count.max(0) as u32,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            delivered_at: row.try_get("delivered_at")?,
        })
    }

    async fn write_record(
        record: &OrderRecord,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    ) -> Result<()> {
        let payload_json = record
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let customer = record.customer.clone().unwrap_or_default();
        let address = record.address.clone().unwrap_or_default();

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO orders (
                external_order_id, order_code, status, tracking_code,
                customer_name, customer_document, customer_email, customer_phone,
                address_zipcode, address_street, address_number, address_complement,
                address_district, address_city, address_state,
                total_value, shipping_cost, payload_json,
                retry_count, last_error, created_at, updated_at, delivered_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            "#,
        )
        .bind(record.order_id.as_str())
        .bind(&record.order_code)
        .bind(record.status.as_str())
        .bind(&record.tracking_code)
        .bind(&customer.name)
        .bind(&customer.document)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&address.zipcode)
        .bind(&address.street)
        .bind(&address.number)
        .bind(&address.complement)
        .bind(&address.district)
        .bind(&address.city)
        .bind(&address.state)
        .bind(record.total_value)
        .bind(record.shipping_cost)
        .bind(payload_json)
        .bind(i64::from(record.retry_count))
        .bind(&record.last_error)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.delivered_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn upsert(&self, patch: OrderPatch) -> Result<OrderRecord> {
        let _write = self.write_lock.lock().await;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT * FROM orders WHERE external_order_id = ?1")
            .bind(patch.order_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let record = match existing {
            Some(row) => {
                let mut record = Self::row_to_record(row)?;
                record.apply(&patch, now);
                record
            }
            None => OrderRecord::from_patch(&patch, now),
        };

        Self::write_record(&record, &mut tx).await?;
        tx.commit().await?;

        tracing::debug!(order_id = %record.order_id, status = %record.status, "order saved");
        Ok(record)
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query("SELECT * FROM orders WHERE external_order_id = ?1")
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_record).transpose()
    }

    async fn get_status(&self, order_id: &OrderId) -> Result<Option<OrderStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE external_order_id = ?1")
                .bind(order_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        status
            .map(|raw| OrderStatus::parse(&raw).ok_or(StoreError::InvalidStatus(raw)))
            .transpose()
    }

    async fn list_awaiting_delivery(&self, max_retries: u32) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE status IN ('created', 'pending', 'shipped')
              AND tracking_code IS NOT NULL
              AND tracking_code != ''
              AND tracking_code != ?1
              AND retry_count < ?2
            ORDER BY updated_at ASC
            "#,
        )
        .bind(crate::record::NO_TRACKING)
        .bind(i64::from(max_retries))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn list(&self, status: Option<OrderStatus>, limit: usize) -> Result<Vec<OrderRecord>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM orders WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2",
                )
                .bind(status.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM orders ORDER BY created_at DESC LIMIT ?1")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM orders GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = StoreStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("n")?;
            stats.by_status.insert(status, count.max(0) as u64);
            stats.total += count.max(0) as u64;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{OrderSnapshot, NO_TRACKING};

    async fn store() -> SqliteOrderStore {
        SqliteOrderStore::connect("sqlite::memory:").await.unwrap()
    }

    fn snapshot() -> OrderSnapshot {
        OrderSnapshot {
            order_code: Some("ORD-1".to_string()),
            customer: Some(Customer {
                name: Some("Dora".to_string()),
                document: Some("12345678900".to_string()),
                ..Default::default()
            }),
            address: Some(Address {
                zipcode: Some("01310100".to_string()),
                city: Some("São Paulo".to_string()),
                ..Default::default()
            }),
            total_value: Some(80.0),
            shipping_cost: Some(15.0),
            payload: Some(serde_json::json!({"id": "1", "code": "ORD-1"})),
        }
    }

    #[tokio::test]
    async fn upsert_roundtrips_through_sqlite() {
        let store = store().await;
        let id = OrderId::new("1");

        store
            .upsert(
                OrderPatch::new(id.clone())
                    .status(OrderStatus::Pending)
                    .snapshot(snapshot()),
            )
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Pending);
        assert_eq!(record.order_code.as_deref(), Some("ORD-1"));
        assert_eq!(record.customer.as_ref().unwrap().name.as_deref(), Some("Dora"));
        assert_eq!(record.payload.as_ref().unwrap()["code"], "ORD-1");
        assert_eq!(record.retry_count, 0);
    }

    #[tokio::test]
    async fn merge_preserves_snapshot_on_error_updates() {
        let store = store().await;
        let id = OrderId::new("2");

        store
            .upsert(
                OrderPatch::new(id.clone())
                    .status(OrderStatus::Pending)
                    .snapshot(snapshot()),
            )
            .await
            .unwrap();
        store
            .upsert(OrderPatch::new(id.clone()).error("carrier timeout"))
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.last_error.as_deref(), Some("carrier timeout"));
        assert_eq!(record.status, OrderStatus::Pending);
        assert_eq!(record.customer.as_ref().unwrap().name.as_deref(), Some("Dora"));
        assert_eq!(record.address.as_ref().unwrap().city.as_deref(), Some("São Paulo"));
    }

    #[tokio::test]
    async fn delivered_status_is_not_regressed() {
        let store = store().await;
        let id = OrderId::new("3");

        store
            .upsert(OrderPatch::new(id.clone()).status(OrderStatus::Delivered))
            .await
            .unwrap();
        store
            .upsert(OrderPatch::new(id.clone()).status(OrderStatus::Shipped))
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Delivered);
        assert!(record.delivered_at.is_some());
    }

    #[tokio::test]
    async fn backlog_query_applies_all_filters() {
        let store = store().await;

        store
            .upsert(
                OrderPatch::new(OrderId::new("keep"))
                    .status(OrderStatus::Shipped)
                    .tracking_code("TRK-1"),
            )
            .await
            .unwrap();
        store
            .upsert(
                OrderPatch::new(OrderId::new("sentinel"))
                    .status(OrderStatus::Shipped)
                    .tracking_code(NO_TRACKING),
            )
            .await
            .unwrap();
        store
            .upsert(OrderPatch::new(OrderId::new("untracked")).status(OrderStatus::Pending))
            .await
            .unwrap();
        store
            .upsert(
                OrderPatch::new(OrderId::new("done"))
                    .status(OrderStatus::Delivered)
                    .tracking_code("TRK-2"),
            )
            .await
            .unwrap();

        let backlog = store.list_awaiting_delivery(6).await.unwrap();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].order_id.as_str(), "keep");
    }

    #[tokio::test]
    async fn stats_counts_match_rows() {
        let store = store().await;
        store
            .upsert(OrderPatch::new(OrderId::new("1")).status(OrderStatus::Pending))
            .await
            .unwrap();
        store
            .upsert(OrderPatch::new(OrderId::new("2")).status(OrderStatus::Delivered))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.get("pending"), Some(&1));
        assert_eq!(stats.by_status.get("delivered"), Some(&1));
    }

    #[tokio::test]
    async fn concurrent_same_key_upserts_all_serialize() {
        // File-backed on purpose: with multiple pooled connections,
        // overlapping read-merge-write transactions are where writes
        // used to fail instead of queueing.
        let path = std::env::temp_dir().join(format!(
            "order-store-concurrency-{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let url = format!("sqlite://{}", path.display());
        let store = SqliteOrderStore::connect(&url).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..10 {
                    store
                        .upsert(OrderPatch::new(OrderId::new("hot")).error("tracking query failed"))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let record = store.get(&OrderId::new("hot")).await.unwrap().unwrap();
        assert_eq!(record.retry_count, 40);

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn get_status_for_missing_order_is_none() {
        let store = store().await;
        assert!(store
            .get_status(&OrderId::new("missing"))
            .await
            .unwrap()
            .is_none());
    }
}
