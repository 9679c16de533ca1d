//! Shipping provider client: shipment creation, rate quotes, and
//! tracking queries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Carrier, Config};
use domain::{
    PACKAGE_HEIGHT_CM, PACKAGE_LENGTH_CM, PACKAGE_WIDTH_CM, ShipmentRequest,
};
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FulfillmentError, Result};

/// Status strings (lowercased) that count as a completed delivery.
const DELIVERED_MARKERS: [&str; 4] = ["delivered", "entregue", "finalizado", "finalized"];

/// Reference returned by the provider for a created shipment.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierReference {
    /// The provider's own order id, when it returns one.
    pub carrier_order_id: Option<String>,
}

/// Raw rate quote response from the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub raw: Value,
}

/// Tracking status as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingStatus {
    pub raw: String,
}

impl TrackingStatus {
    /// Case-insensitive substring match against the known delivered
    /// status strings, including localized forms.
    pub fn is_delivered(&self) -> bool {
        let status = self.raw.to_lowercase();
        DELIVERED_MARKERS
            .iter()
            .any(|marker| status.contains(marker))
    }
}

/// Trait for shipping provider operations.
#[async_trait]
pub trait ShippingClient: Send + Sync {
    /// Registers a shipment with the provider.
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<CarrierReference>;

    /// Requests a rate quote for a shipment.
    async fn quote_shipment(&self, request: &ShipmentRequest) -> Result<RateQuote>;

    /// Queries the current tracking status for a shipment.
    async fn tracking_status(&self, tracking_code: &str) -> Result<TrackingStatus>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ShipmentItemPayload {
    #[serde(rename = "SKU")]
    sku: String,
    description: String,
    quantity: u32,
    price: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ShipmentPayload {
    order_number: String,
    recipient_document: String,
    recipient_name: String,
    recipient_email: String,
    recipient_phone: String,
    recipient_zip_code: String,
    recipient_address: String,
    recipient_address_number: String,
    recipient_address_complement: String,
    recipient_address_district: String,
    recipient_city: String,
    recipient_state: String,
    recipient_country: &'static str,
    package_height: u32,
    package_width: u32,
    package_length: u32,
    package_weight: f64,
    invoice_value: f64,
    shipping_quote_value: f64,
    items: Vec<ShipmentItemPayload>,
}

impl ShipmentPayload {
    fn from_request(request: &ShipmentRequest) -> Self {
        Self {
            order_number: request.order_code.clone(),
            recipient_document: request.recipient_document.clone(),
            recipient_name: request.recipient_name.clone(),
            recipient_email: request.recipient_email.clone(),
            recipient_phone: request.recipient_phone.clone(),
            recipient_zip_code: request.recipient_zipcode.clone(),
            recipient_address: request.street.clone(),
            recipient_address_number: request.number.clone(),
            recipient_address_complement: request.complement.clone(),
            recipient_address_district: request.district.clone(),
            recipient_city: request.city.clone(),
            recipient_state: request.state.clone(),
            recipient_country: "BR",
            package_height: PACKAGE_HEIGHT_CM,
            package_width: PACKAGE_WIDTH_CM,
            package_length: PACKAGE_LENGTH_CM,
            package_weight: request.package_weight_kg,
            invoice_value: request.invoice_value,
            shipping_quote_value: request.declared_shipping_value,
            items: request
                .items
                .iter()
                .map(|item| ShipmentItemPayload {
                    sku: item.sku.clone(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QuoteItemPayload {
    weight: f64,
    length: u32,
    height: u32,
    width: u32,
    quantity: u32,
}

#[derive(Serialize)]
struct QuotePayload {
    #[serde(rename = "SellerCEP")]
    seller_cep: String,
    #[serde(rename = "RecipientCEP")]
    recipient_cep: String,
    #[serde(rename = "ShipmentInvoiceValue")]
    shipment_invoice_value: f64,
    #[serde(rename = "RecipientCountry")]
    recipient_country: &'static str,
    #[serde(rename = "ShippingItemArray")]
    shipping_item_array: Vec<QuoteItemPayload>,
}

impl QuotePayload {
    fn from_request(request: &ShipmentRequest) -> Self {
        Self {
            seller_cep: request.seller_zipcode.clone(),
            recipient_cep: request.recipient_zipcode.clone(),
            shipment_invoice_value: request.invoice_value,
            recipient_country: "BR",
            shipping_item_array: request
                .items
                .iter()
                .map(|item| QuoteItemPayload {
                    weight: item.weight_grams / 1000.0,
                    length: PACKAGE_LENGTH_CM,
                    height: PACKAGE_HEIGHT_CM,
                    width: PACKAGE_WIDTH_CM,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TrackingPayload {
    tracking_number: String,
}

/// Live shipping client backed by `reqwest`.
pub struct HttpShippingClient {
    client: reqwest::Client,
    config: Arc<Config>,
}

impl HttpShippingClient {
    pub fn new(client: reqwest::Client, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Applies the carrier-specific authentication header.
    fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self
            .config
            .carrier_token
            .as_deref()
            .ok_or(FulfillmentError::Configuration("CARRIER_API_TOKEN"))?;

        Ok(match self.config.carrier {
            Carrier::Frenet | Carrier::Custom => {
                request.header(AUTHORIZATION, format!("Basic {token}"))
            }
            Carrier::Loggi => request.header(AUTHORIZATION, format!("Bearer {token}")),
            Carrier::Kangu => request.header("token", token),
        })
    }
}

async fn provider_error(response: reqwest::Response) -> FulfillmentError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    FulfillmentError::Provider { status, body }
}

/// Pulls the provider's order reference out of a response body; the
/// field name varies by provider.
fn extract_reference(body: &Value) -> Option<String> {
    ["OrderId", "order_id", "id"].iter().find_map(|key| {
        body.get(*key).and_then(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

#[async_trait]
impl ShippingClient for HttpShippingClient {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<CarrierReference> {
        let payload = ShipmentPayload::from_request(request);
        let response = self
            .authorize(self.client.post(&self.config.shipping_api_url))?
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let carrier_order_id = extract_reference(&body);
        tracing::info!(
            order_code = %request.order_code,
            carrier_order_id = carrier_order_id.as_deref().unwrap_or("-"),
            "shipment created at provider"
        );

        Ok(CarrierReference { carrier_order_id })
    }

    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn quote_shipment(&self, request: &ShipmentRequest) -> Result<RateQuote> {
        let payload = QuotePayload::from_request(request);
        let response = self
            .authorize(self.client.post(&self.config.shipping_api_url))?
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let raw: Value = response.json().await.unwrap_or(Value::Null);
        Ok(RateQuote { raw })
    }

    #[tracing::instrument(skip(self))]
    async fn tracking_status(&self, tracking_code: &str) -> Result<TrackingStatus> {
        let payload = TrackingPayload {
            tracking_number: tracking_code.to_string(),
        };
        let response = self
            .authorize(self.client.post(&self.config.tracking_api_url))?
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let raw = body
            .get("CurrentStatus")
            .or_else(|| body.get("Status"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(TrackingStatus { raw })
    }
}

#[derive(Debug, Default)]
struct InMemoryShippingState {
    shipments: Vec<String>,
    quote_calls: u32,
    tracking_calls: u32,
    tracking: HashMap<String, String>,
    fail_on_create: bool,
    fail_on_quote: bool,
    fail_on_tracking: bool,
    transient_create_failures: u32,
    next_id: u32,
}

/// In-memory shipping client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShippingClient {
    state: Arc<RwLock<InMemoryShippingState>>,
}

impl InMemoryShippingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every create_shipment call fail.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Makes the next `count` create_shipment calls fail, then recover.
    pub fn fail_next_creates(&self, count: u32) {
        self.state.write().unwrap().transient_create_failures = count;
    }

    pub fn set_fail_on_quote(&self, fail: bool) {
        self.state.write().unwrap().fail_on_quote = fail;
    }

    pub fn set_fail_on_tracking(&self, fail: bool) {
        self.state.write().unwrap().fail_on_tracking = fail;
    }

    /// Sets the status reported for a tracking code.
    pub fn set_tracking_status(&self, tracking_code: &str, status: &str) {
        self.state
            .write()
            .unwrap()
            .tracking
            .insert(tracking_code.to_string(), status.to_string());
    }

    /// Order codes of shipments created so far.
    pub fn shipments(&self) -> Vec<String> {
        self.state.read().unwrap().shipments.clone()
    }

    pub fn shipment_count(&self) -> usize {
        self.state.read().unwrap().shipments.len()
    }

    pub fn quote_count(&self) -> u32 {
        self.state.read().unwrap().quote_calls
    }

    pub fn tracking_count(&self) -> u32 {
        self.state.read().unwrap().tracking_calls
    }
}

#[async_trait]
impl ShippingClient for InMemoryShippingClient {
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<CarrierReference> {
        let mut state = self.state.write().unwrap();

        if state.transient_create_failures > 0 {
            state.transient_create_failures -= 1;
            return Err(FulfillmentError::Unavailable(
                "shipping service unavailable".to_string(),
            ));
        }
        if state.fail_on_create {
            return Err(FulfillmentError::Provider {
                status: 502,
                body: "shipment rejected".to_string(),
            });
        }

        state.next_id += 1;
        let reference = format!("PROV-{:04}", state.next_id);
        state.shipments.push(request.order_code.clone());

        Ok(CarrierReference {
            carrier_order_id: Some(reference),
        })
    }

    async fn quote_shipment(&self, request: &ShipmentRequest) -> Result<RateQuote> {
        let mut state = self.state.write().unwrap();
        state.quote_calls += 1;

        if state.fail_on_quote {
            return Err(FulfillmentError::Provider {
                status: 502,
                body: "quote rejected".to_string(),
            });
        }

        Ok(RateQuote {
            raw: serde_json::json!({
                "SellerCEP": request.seller_zipcode,
                "RecipientCEP": request.recipient_zipcode,
                "ShippingPrice": request.declared_shipping_value,
            }),
        })
    }

    async fn tracking_status(&self, tracking_code: &str) -> Result<TrackingStatus> {
        let mut state = self.state.write().unwrap();
        state.tracking_calls += 1;

        if state.fail_on_tracking {
            return Err(FulfillmentError::Provider {
                status: 503,
                body: "tracking unavailable".to_string(),
            });
        }

        let raw = state
            .tracking
            .get(tracking_code)
            .cloned()
            .unwrap_or_else(|| "in transit".to_string());
        Ok(TrackingStatus { raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    fn request() -> ShipmentRequest {
        ShipmentRequest {
            order_id: OrderId::new("10"),
            order_code: "ORD-10".to_string(),
            recipient_name: "Bruno Silva".to_string(),
            recipient_document: "12345678900".to_string(),
            recipient_email: "bruno@example.com".to_string(),
            recipient_phone: "11988887777".to_string(),
            recipient_zipcode: "01310100".to_string(),
            street: "Av. Paulista".to_string(),
            number: "1000".to_string(),
            complement: String::new(),
            district: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            seller_zipcode: "03320001".to_string(),
            package_weight_kg: 0.5,
            invoice_value: 150.0,
            declared_shipping_value: 22.5,
            items: vec![domain::ShipmentItem {
                sku: "A-1".to_string(),
                description: "Mug".to_string(),
                quantity: 2,
                price: 75.0,
                weight_grams: 500.0,
            }],
        }
    }

    #[test]
    fn shipment_payload_uses_provider_field_names() {
        let payload = serde_json::to_value(ShipmentPayload::from_request(&request())).unwrap();

        assert_eq!(payload["OrderNumber"], "ORD-10");
        assert_eq!(payload["RecipientZipCode"], "01310100");
        assert_eq!(payload["RecipientCountry"], "BR");
        assert_eq!(payload["PackageLength"], 20);
        assert_eq!(payload["PackageWidth"], 15);
        assert_eq!(payload["PackageHeight"], 10);
        assert_eq!(payload["PackageWeight"], 0.5);
        assert_eq!(payload["InvoiceValue"], 150.0);
        assert_eq!(payload["Items"][0]["SKU"], "A-1");
        assert_eq!(payload["Items"][0]["Description"], "Mug");
        assert_eq!(payload["Items"][0]["Quantity"], 2);
    }

    #[test]
    fn quote_payload_uses_provider_field_names() {
        let payload = serde_json::to_value(QuotePayload::from_request(&request())).unwrap();

        assert_eq!(payload["SellerCEP"], "03320001");
        assert_eq!(payload["RecipientCEP"], "01310100");
        assert_eq!(payload["ShipmentInvoiceValue"], 150.0);
        assert_eq!(payload["ShippingItemArray"][0]["Weight"], 0.5);
        assert_eq!(payload["ShippingItemArray"][0]["Quantity"], 2);
    }

    #[test]
    fn delivered_detection_matches_substrings_case_insensitively() {
        for raw in ["Delivered", "ENTREGUE ao destinatário", "Pedido finalizado", "Finalized"] {
            assert!(TrackingStatus { raw: raw.to_string() }.is_delivered(), "{raw}");
        }
        for raw in ["in transit", "posted", "aguardando coleta", ""] {
            assert!(!TrackingStatus { raw: raw.to_string() }.is_delivered(), "{raw}");
        }
    }

    #[test]
    fn reference_extraction_probes_known_keys() {
        assert_eq!(
            extract_reference(&serde_json::json!({"OrderId": "F-9"})),
            Some("F-9".to_string())
        );
        assert_eq!(
            extract_reference(&serde_json::json!({"id": 42})),
            Some("42".to_string())
        );
        assert_eq!(extract_reference(&serde_json::json!({"other": true})), None);
    }

    #[tokio::test]
    async fn in_memory_create_and_fail_flag() {
        let client = InMemoryShippingClient::new();

        let reference = client.create_shipment(&request()).await.unwrap();
        assert_eq!(reference.carrier_order_id.as_deref(), Some("PROV-0001"));
        assert_eq!(client.shipment_count(), 1);

        client.set_fail_on_create(true);
        assert!(client.create_shipment(&request()).await.is_err());
        assert_eq!(client.shipment_count(), 1);
    }

    #[tokio::test]
    async fn in_memory_transient_failures_recover() {
        let client = InMemoryShippingClient::new();
        client.fail_next_creates(2);

        assert!(client.create_shipment(&request()).await.is_err());
        assert!(client.create_shipment(&request()).await.is_err());
        assert!(client.create_shipment(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn in_memory_tracking_defaults_to_in_transit() {
        let client = InMemoryShippingClient::new();

        let status = client.tracking_status("TRK-1").await.unwrap();
        assert!(!status.is_delivered());

        client.set_tracking_status("TRK-1", "Entregue");
        let status = client.tracking_status("TRK-1").await.unwrap();
        assert!(status.is_delivered());
        assert_eq!(client.tracking_count(), 2);
    }
}
