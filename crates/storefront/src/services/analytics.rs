//! Analytics event forwarding.
//!
//! Cart events are converted to [`AnalyticsEvent`]s and handed to an
//! [`AnalyticsSink`] by a background task. Sink failures are logged and
//! dropped; they never reach the cart.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::events::{CartEvent, EventBus};

const SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when delivering analytics events.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// API key cannot be sent as a header.
    #[error("Invalid API key format: {0}")]
    InvalidApiKey(String),
}

/// An analytics event as delivered to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub properties: serde_json::Value,
}

impl AnalyticsEvent {
    /// Convert a cart event, stamping it with a fresh id and the current time.
    #[must_use]
    pub fn from_cart_event(event: &CartEvent) -> Self {
        let mut properties = serde_json::to_value(event).unwrap_or_default();
        if let Some(map) = properties.as_object_mut() {
            map.remove("type");
        }

        Self {
            id: Uuid::new_v4(),
            name: event.analytics_name(),
            occurred_at: Utc::now(),
            properties,
        }
    }
}

/// Destination for analytics events.
pub trait AnalyticsSink: Send + Sync + 'static {
    /// Deliver one event.
    fn send(
        &self,
        event: &AnalyticsEvent,
    ) -> impl Future<Output = Result<(), AnalyticsError>> + Send;
}

// =============================================================================
// HTTP sink
// =============================================================================

/// Posts events as JSON to an ingestion endpoint.
#[derive(Clone)]
pub struct HttpAnalyticsSink {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAnalyticsSink {
    /// Create a sink for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &AnalyticsConfig) -> Result<Self, AnalyticsError> {
        let mut headers = HeaderMap::new();

        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| AnalyticsError::InvalidApiKey(e.to_string()))?;
        api_key.set_sensitive(true);
        headers.insert("X-Api-Key", api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(SINK_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl AnalyticsSink for HttpAnalyticsSink {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Logs events instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        info!(
            event = event.name,
            event_id = %event.id,
            properties = %event.properties,
            "Analytics event"
        );
        Ok(())
    }
}

// =============================================================================
// Forwarder
// =============================================================================

/// Forward every event published on `bus` to `sink`.
///
/// The task ends once every handle to the bus has been dropped.
pub fn spawn_analytics_forwarder<S: AnalyticsSink>(bus: &EventBus, sink: S) -> JoinHandle<()> {
    let mut events = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let event = AnalyticsEvent::from_cart_event(&event);
                    match sink.send(&event).await {
                        Ok(()) => debug!(event = event.name, "Analytics event delivered"),
                        Err(e) => warn!(event = event.name, error = %e, "Analytics delivery failed"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Analytics forwarder lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chargecart_core::{CurrencyCode, Money, VariantId};
    use secrecy::SecretString;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn added() -> CartEvent {
        CartEvent::ItemAdded {
            variant_id: VariantId::new("gid://shopify/ProductVariant/1"),
            product_handle: "fast-charge-usbc-cable".to_string(),
            quantity: 2,
            unit_price: Money::from_cents(2490, CurrencyCode::USD),
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        names: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl AnalyticsSink for RecordingSink {
        async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
            self.names.lock().unwrap().push(event.name);
            if self.fail {
                return Err(AnalyticsError::Api {
                    status: 503,
                    message: "down".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_from_cart_event() {
        let event = AnalyticsEvent::from_cart_event(&added());
        assert_eq!(event.name, "add_to_cart");
        assert_eq!(event.properties["quantity"], 2);
        assert_eq!(event.properties["product_handle"], "fast-charge-usbc-cable");
        assert!(event.properties.get("type").is_none());
    }

    #[tokio::test]
    async fn test_forwarder_swallows_sink_errors() {
        let bus = EventBus::default();
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let handle = spawn_analytics_forwarder(&bus, sink.clone());

        bus.publish(added());
        bus.publish(added());
        drop(bus);
        handle.await.unwrap();

        assert_eq!(*sink.names.lock().unwrap(), ["add_to_cart", "add_to_cart"]);
    }

    #[tokio::test]
    async fn test_http_sink_posts_json_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/events"))
            .and(header("X-Api-Key", "k3Y9pQ2mXv7Lr4Tz"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpAnalyticsSink::new(&AnalyticsConfig {
            endpoint: Url::parse(&format!("{}/v1/events", server.uri())).unwrap(),
            api_key: SecretString::from("k3Y9pQ2mXv7Lr4Tz"),
        })
        .unwrap();

        sink.send(&AnalyticsEvent::from_cart_event(&added()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_sink_reports_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sink = HttpAnalyticsSink::new(&AnalyticsConfig {
            endpoint: Url::parse(&server.uri()).unwrap(),
            api_key: SecretString::from("k3Y9pQ2mXv7Lr4Tz"),
        })
        .unwrap();

        let err = sink
            .send(&AnalyticsEvent::from_cart_event(&added()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Api { status: 500, .. }));
    }
}
