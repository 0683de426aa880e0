//! Reqwest-based sender for signed test deliveries.
//!
//! Sellers use this to fire a signed event at their own endpoint and check
//! that their receiver verifies it. The signature covers the exact bytes
//! that go on the wire.

use crate::clock::{Clock, SystemClock};
use crate::config::WebhookConfig;
use crate::crypto::signing::build_signature_headers;
use crate::WebhookError;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Default request timeout for outbound deliveries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Event body as sent on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEvent {
    /// Event id.
    pub id: String,
    /// Event kind.
    pub event: String,
    /// Kind-specific payload.
    pub data: Map<String, Value>,
    /// RFC 3339 generation time.
    pub timestamp: String,
    /// Seller the event belongs to.
    pub seller_id: String,
}

impl OutgoingEvent {
    /// Build an event stamped at `at`.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        data: Map<String, Value>,
        seller_id: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            event: kind.into(),
            data,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            seller_id: seller_id.into(),
        }
    }

    /// Serialize to the exact bytes that get signed and sent.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WebhookError> {
        serde_json::to_vec(self)
            .map_err(|e| WebhookError::Transport(format!("Failed to serialize event: {}", e)))
    }
}

/// Result of one outbound delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// HTTP status returned by the receiver.
    pub status: u16,
    /// Response body, lossily decoded.
    pub body: String,
}

impl DeliveryReport {
    /// Whether the receiver acknowledged with a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Signed webhook sender.
pub struct WebhookSender {
    client: Client,
    config: WebhookConfig,
    clock: Arc<dyn Clock>,
    user_agent: String,
}

impl WebhookSender {
    /// Create a sender signing with `config`.
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        config.validate()?;
        let client = build_client(DEFAULT_TIMEOUT)?;

        Ok(Self {
            client,
            config,
            clock: Arc::new(SystemClock),
            user_agent: build_user_agent(),
        })
    }

    /// Set request timeout.
    pub fn try_with_timeout(mut self, timeout: Duration) -> Result<Self, WebhookError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Use a custom clock for the timestamp header.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the body and headers for a delivery without sending it.
    pub fn prepare(&self, event: &OutgoingEvent) -> Result<PreparedDelivery, WebhookError> {
        let body = event.to_bytes()?;
        let headers = build_signature_headers(&self.config, &body, self.clock.as_ref());

        Ok(PreparedDelivery {
            body,
            headers: vec![headers.signature, headers.timestamp],
        })
    }

    /// Sign `event` and POST it to `url`.
    pub fn send(&self, url: &str, event: &OutgoingEvent) -> Result<DeliveryReport, WebhookError> {
        let prepared = self.prepare(event)?;

        let mut request = self
            .client
            .post(url)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &prepared.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(prepared.body)
            .send()
            .map_err(|e| WebhookError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| WebhookError::Transport(format!("Failed to read body: {}", e)))?;

        tracing::info!(
            url = url,
            kind = %event.event,
            event_id = %event.id,
            status,
            "Delivered test webhook"
        );

        Ok(DeliveryReport { status, body })
    }
}

/// Body and headers of a signed delivery.
#[derive(Debug, Clone)]
pub struct PreparedDelivery {
    /// Exact bytes that were signed.
    pub body: Vec<u8>,
    /// `(name, value)` header pairs to attach.
    pub headers: Vec<(String, String)>,
}

fn build_client(timeout: Duration) -> Result<Client, WebhookError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| WebhookError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Build the User-Agent string.
///
/// Format: `sellerhook/<version>`
pub fn build_user_agent() -> String {
    format!("sellerhook/{}", env!("CARGO_PKG_VERSION"))
}
