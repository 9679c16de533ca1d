//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Shipping provider whose wire encoding the live client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Carrier {
    /// Frenet-style API, `Authorization: Basic <token>`.
    #[default]
    Frenet,
    /// Loggi-style API, `Authorization: Bearer <token>`.
    Loggi,
    /// Kangu-style API, bare `token` header.
    Kangu,
    /// Custom endpoint using the Frenet encoding.
    Custom,
}

impl Carrier {
    /// Parses the `CARRIER` environment value. Unknown values fall back
    /// to the default encoding.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "loggi" => Carrier::Loggi,
            "kangu" => Carrier::Kangu,
            "custom" => Carrier::Custom,
            _ => Carrier::Frenet,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Carrier::Frenet => "frenet",
            Carrier::Loggi => "loggi",
            Carrier::Kangu => "kangu",
            Carrier::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an invoiced order is handed to the carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShipmentMode {
    /// Register the order with the carrier; a label (and tracking code)
    /// is produced out of band and the order stays `pending`.
    #[default]
    CreateShipment,
    /// Obtain a rate quote, synthesize a tracking code, and mark the
    /// order shipped at the source immediately.
    QuoteLabel,
}

impl ShipmentMode {
    /// Parses the `SHIPMENT_MODE` environment value (`create` | `quote`).
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "quote" => ShipmentMode::QuoteLabel,
            _ => ShipmentMode::CreateShipment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentMode::CreateShipment => "create",
            ShipmentMode::QuoteLabel => "quote",
        }
    }
}

impl std::fmt::Display for ShipmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable application configuration, built once at startup and passed
/// by reference into every component.
///
/// Environment variables (all optional, with defaults):
/// - `SOURCE_API_BASE` / `SOURCE_API_TOKEN` — order source endpoint + credential
/// - `CARRIER_API_TOKEN` — shipping provider credential
/// - `SHIPPING_API_URL` / `TRACKING_API_URL` — carrier endpoints
/// - `CARRIER` — wire encoding (`frenet` | `loggi` | `kangu` | `custom`)
/// - `SHIPMENT_MODE` — `create` | `quote`
/// - `CARRIER_CODE` / `CARRIER_NAME` — carrier identity reported to the source
/// - `SELLER_ZIPCODE` — shipment origin
/// - `DEFAULT_SHIPPING_VALUE` — declared quote value when the order has none
/// - `TRACKER_INTERVAL` — reconciliation interval in seconds (default 600)
/// - `MAX_RETRIES` / `RETRY_DELAY` — external-call retry policy (default 3 / 2 s)
/// - `REQUEST_TIMEOUT` — per-request timeout in seconds (default 30)
/// - `DATABASE_URL` — SQLite url (default `sqlite://orders.db`)
/// - `HOST` / `PORT` — bind address (default `0.0.0.0:3000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub source_api_base: String,
    pub source_token: Option<String>,
    pub carrier_token: Option<String>,
    pub shipping_api_url: String,
    pub tracking_api_url: String,
    pub carrier: Carrier,
    pub shipment_mode: ShipmentMode,
    pub carrier_code: String,
    pub carrier_name: String,
    pub seller_zipcode: String,
    pub default_shipping_value: f64,
    pub tracker_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub database_url: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            source_api_base: env_or("SOURCE_API_BASE", "https://api.dooca.store"),
            source_token: std::env::var("SOURCE_API_TOKEN").ok().filter(|t| !t.is_empty()),
            carrier_token: std::env::var("CARRIER_API_TOKEN").ok().filter(|t| !t.is_empty()),
            shipping_api_url: env_or("SHIPPING_API_URL", "https://api.frenet.com.br/v1/shipments"),
            tracking_api_url: env_or(
                "TRACKING_API_URL",
                "https://api.frenet.com.br/tracking/trackinginfo",
            ),
            carrier: Carrier::parse(&env_or("CARRIER", "frenet")),
            shipment_mode: ShipmentMode::parse(&env_or("SHIPMENT_MODE", "create")),
            carrier_code: env_or("CARRIER_CODE", "LOG_DRPOFF"),
            carrier_name: env_or("CARRIER_NAME", "Loggi Drop Off"),
            seller_zipcode: env_or("SELLER_ZIPCODE", "03320-001"),
            default_shipping_value: env_parse("DEFAULT_SHIPPING_VALUE", 10.0),
            tracker_interval: Duration::from_secs(env_parse("TRACKER_INTERVAL", 600)),
            max_retries: env_parse("MAX_RETRIES", 3),
            retry_delay: Duration::from_secs(env_parse("RETRY_DELAY", 2)),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT", 30)),
            database_url: env_or("DATABASE_URL", "sqlite://orders.db"),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true when both external credentials are configured.
    pub fn credentials_present(&self) -> bool {
        self.source_token.is_some() && self.carrier_token.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_api_base: "https://api.dooca.store".to_string(),
            source_token: None,
            carrier_token: None,
            shipping_api_url: "https://api.frenet.com.br/v1/shipments".to_string(),
            tracking_api_url: "https://api.frenet.com.br/tracking/trackinginfo".to_string(),
            carrier: Carrier::Frenet,
            shipment_mode: ShipmentMode::CreateShipment,
            carrier_code: "LOG_DRPOFF".to_string(),
            carrier_name: "Loggi Drop Off".to_string(),
            seller_zipcode: "03320-001".to_string(),
            default_shipping_value: 10.0,
            tracker_interval: Duration::from_secs(600),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            database_url: "sqlite://orders.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
