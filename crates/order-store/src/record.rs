//! Order records, upsert patches, and the merge rule.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Address, Customer, OrderEvent, OrderStatus};
use serde::Serialize;
use serde_json::Value;

/// Sentinel tracking code meaning "no tracking will ever exist".
///
/// Rows carrying it are excluded from the reconciliation backlog.
pub const NO_TRACKING: &str = "NO-TRACKING";

/// Snapshot fields captured at ingest time.
///
/// Treated as append-only enrichment: merging never replaces an
/// existing value with an absent or empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderSnapshot {
    pub order_code: Option<String>,
    pub customer: Option<Customer>,
    pub address: Option<Address>,
    pub total_value: Option<f64>,
    pub shipping_cost: Option<f64>,
    /// Full normalized order payload, kept for audit/redisplay.
    pub payload: Option<Value>,
}

impl OrderSnapshot {
    /// Captures the snapshot fields of a normalized order event.
    pub fn from_event(event: &OrderEvent) -> Self {
        Self {
            order_code: event.order_code.clone(),
            customer: event.customer.clone(),
            address: event.address.clone(),
            total_value: Some(domain::shipment::invoice_value(event.total, &event.items)),
            shipping_cost: event.shipping_cost,
            payload: Some(event.payload.clone()),
        }
    }
}

/// One upsert against the store. Absent fields keep their stored value.
#[derive(Debug, Clone)]
pub struct OrderPatch {
    pub order_id: OrderId,
    pub status: Option<OrderStatus>,
    pub tracking_code: Option<String>,
    pub error: Option<String>,
    pub snapshot: Option<OrderSnapshot>,
}

impl OrderPatch {
    /// Starts a patch for the given order.
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            status: None,
            tracking_code: None,
            error: None,
            snapshot: None,
        }
    }

    /// Sets the target status. Applied only when it does not regress
    /// the stored status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the tracking code.
    pub fn tracking_code(mut self, tracking_code: impl Into<String>) -> Self {
        self.tracking_code = Some(tracking_code.into());
        self
    }

    /// Records a failure message. Increments the retry count; a patch
    /// without an error clears `last_error` instead.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Attaches snapshot fields captured at ingest time.
    pub fn snapshot(mut self, snapshot: OrderSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// The persistent order record, keyed by the external order id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub order_code: Option<String>,
    pub status: OrderStatus,
    pub tracking_code: Option<String>,
    pub customer: Option<Customer>,
    pub address: Option<Address>,
    pub total_value: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub payload: Option<Value>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    /// Creates a fresh record from the first patch seen for an order.
    pub fn from_patch(patch: &OrderPatch, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            order_id: patch.order_id.clone(),
            order_code: None,
            status: OrderStatus::Created,
            tracking_code: None,
            customer: None,
            address: None,
            total_value: None,
            shipping_cost: None,
            payload: None,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        };
        record.apply(patch, now);
        record
    }

    /// Merges a patch into this record.
    ///
    /// Field-level keep-if-absent semantics: an error-only update never
    /// blanks out previously captured customer/address data. `status`
    /// only moves forward, `retry_count` never decreases, `updated_at`
    /// is bumped on every write, and `delivered_at` is set exactly once
    /// when the status first becomes `delivered`.
    pub fn apply(&mut self, patch: &OrderPatch, now: DateTime<Utc>) {
        if let Some(next) = patch.status {
            if self.status.accepts(next) {
                self.status = next;
            } else {
                tracing::debug!(
                    order_id = %self.order_id,
                    current = %self.status,
                    requested = %next,
                    "refusing status regression"
                );
            }
        }

        self.tracking_code = merge_value(patch.tracking_code.as_deref(), self.tracking_code.take());

        match &patch.error {
            Some(message) => {
                self.retry_count += 1;
                self.last_error = Some(message.clone());
            }
            None => self.last_error = None,
        }

        if let Some(snapshot) = &patch.snapshot {
            self.order_code = merge_value(snapshot.order_code.as_deref(), self.order_code.take());
            self.customer = merge_customer(snapshot.customer.as_ref(), self.customer.take());
            self.address = merge_address(snapshot.address.as_ref(), self.address.take());
            self.total_value = snapshot.total_value.or(self.total_value);
            self.shipping_cost = snapshot.shipping_cost.or(self.shipping_cost);
            if snapshot.payload.is_some() {
                self.payload = snapshot.payload.clone();
            }
        }

        self.updated_at = now;
        if self.status == OrderStatus::Delivered && self.delivered_at.is_none() {
            self.delivered_at = Some(now);
        }
    }

    /// Returns true if this record belongs in the reconciliation
    /// backlog for the given retry cap.
    pub fn is_awaiting_delivery(&self, max_retries: u32) -> bool {
        self.status.is_awaiting_delivery()
            && self.retry_count < max_retries
            && self
                .tracking_code
                .as_deref()
                .is_some_and(|code| !code.is_empty() && code != NO_TRACKING)
    }
}

/// Count of orders per status, plus the total.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub by_status: BTreeMap<String, u64>,
    pub total: u64,
}

fn merge_value(new: Option<&str>, old: Option<String>) -> Option<String> {
    match new {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => old,
    }
}

fn merge_customer(new: Option<&Customer>, old: Option<Customer>) -> Option<Customer> {
    match (new, old) {
        (Some(new), Some(old)) => Some(Customer {
            name: merge_value(new.name.as_deref(), old.name),
            email: merge_value(new.email.as_deref(), old.email),
            phone: merge_value(new.phone.as_deref(), old.phone),
            document: merge_value(new.document.as_deref(), old.document),
        }),
        (Some(new), None) => Some(new.clone()),
        (None, old) => old,
    }
}

fn merge_address(new: Option<&Address>, old: Option<Address>) -> Option<Address> {
    match (new, old) {
        (Some(new), Some(old)) => Some(Address {
            zipcode: merge_value(new.zipcode.as_deref(), old.zipcode),
            street: merge_value(new.street.as_deref(), old.street),
            number: merge_value(new.number.as_deref(), old.number),
            complement: merge_value(new.complement.as_deref(), old.complement),
            district: merge_value(new.district.as_deref(), old.district),
            city: merge_value(new.city.as_deref(), old.city),
            state: merge_value(new.state.as_deref(), old.state),
        }),
        (Some(new), None) => Some(new.clone()),
        (None, old) => old,
    }
}
