//! Shipment request construction.
//!
//! Turns a normalized order event into the carrier-agnostic request the
//! shipping client encodes: aggregated package weight, declared invoice
//! value, and cleaned-up recipient fields.

use chrono::{DateTime, Utc};
use common::{Config, OrderId};

use crate::error::ShipmentError;
use crate::event::{OrderEvent, OrderItem};

/// Default per-item weight in grams when the source omits it.
pub const DEFAULT_ITEM_WEIGHT_G: f64 = 500.0;

/// Minimum billable package weight in kilograms.
pub const MIN_PACKAGE_WEIGHT_KG: f64 = 0.1;

/// Fixed package dimensions in centimeters.
pub const PACKAGE_LENGTH_CM: u32 = 20;
pub const PACKAGE_WIDTH_CM: u32 = 15;
pub const PACKAGE_HEIGHT_CM: u32 = 10;

/// One item in the shipment manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentItem {
    pub sku: String,
    pub description: String,
    pub quantity: u32,
    pub price: f64,
    pub weight_grams: f64,
}

/// Carrier-agnostic shipment request.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentRequest {
    pub order_id: OrderId,
    pub order_code: String,
    pub recipient_name: String,
    pub recipient_document: String,
    pub recipient_email: String,
    pub recipient_phone: String,
    pub recipient_zipcode: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub seller_zipcode: String,
    /// Total package weight in kilograms, floored at the billable minimum.
    pub package_weight_kg: f64,
    pub invoice_value: f64,
    pub declared_shipping_value: f64,
    pub items: Vec<ShipmentItem>,
}

impl ShipmentRequest {
    /// Builds a shipment request from a normalized order event.
    ///
    /// A delivery address and a customer record are required; their
    /// absence is a validation failure, distinct from transient network
    /// failures. An order without line items gets one synthetic default
    /// item so a request can still be formed.
    pub fn from_event(event: &OrderEvent, config: &Config) -> Result<Self, ShipmentError> {
        let address = event.address.as_ref().ok_or(ShipmentError::MissingAddress)?;
        let customer = event
            .customer
            .as_ref()
            .ok_or(ShipmentError::MissingCustomer)?;

        let items = if event.items.is_empty() {
            tracing::warn!(order_id = %event.order_id, "order has no items, using a synthetic default item");
            vec![default_item()]
        } else {
            event.items.clone()
        };

        let order_code = event
            .order_code
            .clone()
            .unwrap_or_else(|| event.order_id.to_string());

        let manifest: Vec<ShipmentItem> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| ShipmentItem {
                sku: item.sku.clone().unwrap_or_else(|| format!("ITEM-{}", idx + 1)),
                description: item.name.clone().unwrap_or_else(|| "Product".to_string()),
                quantity: item.quantity.unwrap_or(1),
                price: item.price.unwrap_or(0.0),
                weight_grams: item.weight.unwrap_or(DEFAULT_ITEM_WEIGHT_G),
            })
            .collect();

        Ok(Self {
            order_id: event.order_id.clone(),
            order_code,
            recipient_name: customer.name.clone().unwrap_or_else(|| "Customer".to_string()),
            recipient_document: clean_document(customer.document.as_deref().unwrap_or("")),
            recipient_email: customer.email.clone().unwrap_or_default(),
            recipient_phone: clean_phone(customer.phone.as_deref().unwrap_or("")),
            recipient_zipcode: clean_zipcode(address.zipcode.as_deref().unwrap_or("")),
            street: address.street.clone().unwrap_or_default(),
            number: address.number.clone().unwrap_or_else(|| "S/N".to_string()),
            complement: address.complement.clone().unwrap_or_default(),
            district: address.district.clone().unwrap_or_default(),
            city: address.city.clone().unwrap_or_default(),
            state: address.state.clone().unwrap_or_default(),
            seller_zipcode: clean_zipcode(&config.seller_zipcode),
            package_weight_kg: package_weight_kg(&items),
            invoice_value: invoice_value(event.total, &items),
            declared_shipping_value: event
                .shipping_cost
                .unwrap_or(config.default_shipping_value),
            items: manifest,
        })
    }
}

/// Sums per-item weights (grams), converts to kilograms, and floors the
/// result at the billable minimum.
pub fn package_weight_kg(items: &[OrderItem]) -> f64 {
    let grams: f64 = items
        .iter()
        .map(|item| item.weight.unwrap_or(DEFAULT_ITEM_WEIGHT_G))
        .sum();
    (grams / 1000.0).max(MIN_PACKAGE_WEIGHT_KG)
}

/// Declared value: the explicit order total when present and non-zero,
/// otherwise the sum of per-item price × quantity.
pub fn invoice_value(total: Option<f64>, items: &[OrderItem]) -> f64 {
    match total {
        Some(value) if value > 0.0 => value,
        _ => items
            .iter()
            .map(|item| item.price.unwrap_or(0.0) * f64::from(item.quantity.unwrap_or(1)))
            .sum(),
    }
}

/// Synthetic item substituted when an order carries no line items.
pub fn default_item() -> OrderItem {
    OrderItem {
        sku: None,
        name: None,
        quantity: Some(1),
        price: None,
        weight: Some(1.0),
    }
}

/// Synthesizes a tracking code from the carrier code, the order code,
/// and a time-derived suffix.
pub fn synthesize_tracking_code(
    carrier_code: &str,
    order_code: &str,
    now: DateTime<Utc>,
) -> String {
    format!("{}-{}-{}", carrier_code, order_code, now.format("%y%m%d%H%M%S"))
}

/// Strips punctuation from a postal code.
pub fn clean_zipcode(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '-' | '.' | ' ')).collect()
}

/// Strips formatting from a phone number.
pub fn clean_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '(' | ')' | '-' | ' '))
        .collect()
}

/// Strips punctuation from a tax document.
pub fn clean_document(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '.' | '-' | ' ')).collect()
}
