//! Normalized inbound order events.
//!
//! Webhook payloads arrive either as a flat order object or wrapped as
//! `{ "event": "...", "data": { ... } }`. Parsing unwraps the envelope,
//! coerces the loosely-typed fields once, and produces an explicitly
//! optional structure so missing data is visible before it reaches
//! business logic.

use common::OrderId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::EventError;

/// Fulfillment status value that authorizes processing.
pub const INVOICED: &str = "invoiced";

/// Customer record captured from the order source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Customer {
    #[serde(default, deserialize_with = "stringly")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub phone: Option<String>,
    /// Tax document; the source sends either `cpf` or `document`.
    #[serde(default, alias = "cpf", deserialize_with = "stringly")]
    pub document: Option<String>,
}

/// Delivery address captured from the order source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Address {
    #[serde(default, deserialize_with = "stringly")]
    pub zipcode: Option<String>,
    /// Street; some payloads carry it under `address`.
    #[serde(default, alias = "address", deserialize_with = "stringly")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub complement: Option<String>,
    /// District; the source sends either `district` or `neighborhood`.
    #[serde(default, alias = "neighborhood", deserialize_with = "stringly")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub state: Option<String>,
}

/// One order line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrderItem {
    #[serde(default, deserialize_with = "stringly")]
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "numberly_u32")]
    pub quantity: Option<u32>,
    #[serde(default, deserialize_with = "numberly")]
    pub price: Option<f64>,
    /// Item weight in grams.
    #[serde(default, deserialize_with = "numberly")]
    pub weight: Option<f64>,
}

/// A normalized order event, produced by a single parsing step.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub order_code: Option<String>,
    pub fulfillment_status: Option<String>,
    pub customer: Option<Customer>,
    pub address: Option<Address>,
    pub items: Vec<OrderItem>,
    pub total: Option<f64>,
    pub shipping_cost: Option<f64>,
    /// The unwrapped inner payload, kept verbatim for audit/redisplay.
    pub payload: Value,
}

#[derive(Deserialize)]
struct RawOrder {
    #[serde(default, deserialize_with = "stringly")]
    id: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    code: Option<String>,
    #[serde(default, deserialize_with = "stringly")]
    fulfillment_status: Option<String>,
    #[serde(default)]
    customer: Option<Customer>,
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    shipping_address: Option<Address>,
    #[serde(default)]
    items: Option<Vec<OrderItem>>,
    #[serde(default, deserialize_with = "numberly")]
    total: Option<f64>,
    #[serde(default, deserialize_with = "numberly")]
    shipping_cost: Option<f64>,
}

impl OrderEvent {
    /// Parses a raw webhook payload into a normalized event.
    ///
    /// Accepts either a flat order object or an `{event, data}` wrapper;
    /// the unwrap is structural, not a business decision. A missing or
    /// empty order id is a structural rejection.
    pub fn parse(raw: Value) -> Result<Self, EventError> {
        let inner = unwrap_envelope(raw);
        if !inner.is_object() {
            return Err(EventError::NotAnObject);
        }

        let order: RawOrder = serde_json::from_value(inner.clone())?;
        let order_id = order
            .id
            .filter(|id| !id.is_empty())
            .map(OrderId::new)
            .ok_or(EventError::MissingOrderId)?;

        Ok(Self {
            order_id,
            order_code: order.code,
            fulfillment_status: order.fulfillment_status,
            customer: order.customer,
            address: order.address.or(order.shipping_address),
            items: order.items.unwrap_or_default(),
            total: order.total,
            shipping_cost: order.shipping_cost,
            payload: inner,
        })
    }

    /// Returns true when the gate value authorizes processing.
    pub fn is_invoiced(&self) -> bool {
        self.fulfillment_status.as_deref() == Some(INVOICED)
    }
}

/// Extracts the inner order object from an `{event, data}` wrapper, or
/// returns the payload unchanged when it is already flat.
pub fn unwrap_envelope(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) if map.contains_key("event") && map.contains_key("data") => {
            if let Some(event) = map.get("event").and_then(Value::as_str) {
                tracing::debug!(event, "unwrapped webhook envelope");
            }
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// Upstream payloads are loosely typed: ids and zipcodes arrive as strings
// or numbers, quantities as numbers or numeric strings. Coerce once here.

fn stringly<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn numberly<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn numberly_u32<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().map(|v| v as u32),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}
