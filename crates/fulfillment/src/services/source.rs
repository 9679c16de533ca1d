//! Order source client: pushes fulfillment transitions back to the
//! platform that emitted the order.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Config, OrderId};
use reqwest::header::AUTHORIZATION;
use serde::Serialize;

use crate::error::{FulfillmentError, Result};

/// Trait for order source notifications.
#[async_trait]
pub trait OrderSourceClient: Send + Sync {
    /// Marks an order as shipped, attaching the tracking code.
    async fn mark_shipped(
        &self,
        order_id: &OrderId,
        tracking_code: &str,
        carrier_name: &str,
    ) -> Result<()>;

    /// Marks an order as delivered.
    async fn mark_delivered(&self, order_id: &OrderId) -> Result<()>;
}

#[derive(Serialize)]
struct ShippedBody<'a> {
    shipping_code: &'a str,
    shipping_carrier: &'a str,
}

/// Live order source client backed by `reqwest`.
pub struct HttpOrderSourceClient {
    client: reqwest::Client,
    config: Arc<Config>,
}

impl HttpOrderSourceClient {
    pub fn new(client: reqwest::Client, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self
            .config
            .source_token
            .as_deref()
            .ok_or(FulfillmentError::Configuration("SOURCE_API_TOKEN"))?;
        Ok(request.header(AUTHORIZATION, format!("Bearer {token}")))
    }

    fn fulfillment_url(&self, order_id: &OrderId, transition: &str) -> String {
        format!(
            "{}/orders/{}/fulfillment/{}",
            self.config.source_api_base.trim_end_matches('/'),
            order_id,
            transition
        )
    }
}

async fn source_error(response: reqwest::Response) -> FulfillmentError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    FulfillmentError::Source { status, body }
}

#[async_trait]
impl OrderSourceClient for HttpOrderSourceClient {
    #[tracing::instrument(skip(self))]
    async fn mark_shipped(
        &self,
        order_id: &OrderId,
        tracking_code: &str,
        carrier_name: &str,
    ) -> Result<()> {
        let body = ShippedBody {
            shipping_code: tracking_code,
            shipping_carrier: carrier_name,
        };
        let response = self
            .authorize(self.client.put(self.fulfillment_url(order_id, "shipped")))?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(source_error(response).await);
        }

        tracing::info!(order_id = %order_id, tracking_code, "order marked shipped at source");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn mark_delivered(&self, order_id: &OrderId) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.fulfillment_url(order_id, "delivered")))?
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(source_error(response).await);
        }

        tracing::info!(order_id = %order_id, "order marked delivered at source");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryOrderSourceState {
    shipped: Vec<(OrderId, String, String)>,
    delivered: Vec<OrderId>,
    fail_on_shipped: bool,
    fail_on_delivered: bool,
    transient_delivered_failures: u32,
}

/// In-memory order source for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderSource {
    state: Arc<RwLock<InMemoryOrderSourceState>>,
}

impl InMemoryOrderSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_shipped(&self, fail: bool) {
        self.state.write().unwrap().fail_on_shipped = fail;
    }

    pub fn set_fail_on_delivered(&self, fail: bool) {
        self.state.write().unwrap().fail_on_delivered = fail;
    }

    /// Makes the next `count` mark_delivered calls fail, then recover.
    pub fn fail_next_delivered(&self, count: u32) {
        self.state.write().unwrap().transient_delivered_failures = count;
    }

    pub fn shipped_count(&self) -> usize {
        self.state.read().unwrap().shipped.len()
    }

    pub fn delivered_count(&self) -> usize {
        self.state.read().unwrap().delivered.len()
    }

    /// The most recent shipped notification, as (order id, tracking
    /// code, carrier name).
    pub fn last_shipped(&self) -> Option<(OrderId, String, String)> {
        self.state.read().unwrap().shipped.last().cloned()
    }

    pub fn was_marked_delivered(&self, order_id: &OrderId) -> bool {
        self.state.read().unwrap().delivered.contains(order_id)
    }
}

#[async_trait]
impl OrderSourceClient for InMemoryOrderSource {
    async fn mark_shipped(
        &self,
        order_id: &OrderId,
        tracking_code: &str,
        carrier_name: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_shipped {
            return Err(FulfillmentError::Source {
                status: 502,
                body: "source unavailable".to_string(),
            });
        }
        state.shipped.push((
            order_id.clone(),
            tracking_code.to_string(),
            carrier_name.to_string(),
        ));
        Ok(())
    }

    async fn mark_delivered(&self, order_id: &OrderId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.transient_delivered_failures > 0 {
            state.transient_delivered_failures -= 1;
            return Err(FulfillmentError::Source {
                status: 503,
                body: "source unavailable".to_string(),
            });
        }
        if state.fail_on_delivered {
            return Err(FulfillmentError::Source {
                status: 502,
                body: "source rejected".to_string(),
            });
        }
        state.delivered.push(order_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_shipped_and_delivered_notifications() {
        let source = InMemoryOrderSource::new();
        let id = OrderId::new("10");

        source
            .mark_shipped(&id, "TRK-1", "Loggi Drop Off")
            .await
            .unwrap();
        source.mark_delivered(&id).await.unwrap();

        assert_eq!(source.shipped_count(), 1);
        assert_eq!(
            source.last_shipped(),
            Some((id.clone(), "TRK-1".to_string(), "Loggi Drop Off".to_string()))
        );
        assert!(source.was_marked_delivered(&id));
    }

    #[tokio::test]
    async fn fail_flags_reject_calls() {
        let source = InMemoryOrderSource::new();
        source.set_fail_on_shipped(true);

        let err = source
            .mark_shipped(&OrderId::new("10"), "TRK-1", "Loggi")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(source.shipped_count(), 0);
    }

    #[tokio::test]
    async fn transient_delivered_failures_recover() {
        let source = InMemoryOrderSource::new();
        let id = OrderId::new("10");
        source.fail_next_delivered(1);

        assert!(source.mark_delivered(&id).await.is_err());
        assert!(source.mark_delivered(&id).await.is_ok());
        assert_eq!(source.delivered_count(), 1);
    }
}
