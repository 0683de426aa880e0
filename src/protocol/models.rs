//! Inbound request and event structs, plus event parsing.

use crate::config::WebhookConfig;
use crate::WebhookError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// One inbound webhook call, captured before any deserialization.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    /// Raw body bytes exactly as received.
    pub body: Vec<u8>,

    /// Signature header value.
    pub signature: Option<String>,

    /// Timestamp header value.
    pub timestamp: Option<String>,

    /// Route or source label (e.g. the seller id in the URL path).
    pub source: Option<String>,
}

impl IncomingRequest {
    /// Build a request from raw header pairs.
    ///
    /// Header names are matched case-insensitively against the configured
    /// signature and timestamp header names.
    pub fn from_headers<'a, I>(
        body: impl Into<Vec<u8>>,
        headers: I,
        config: &WebhookConfig,
        source: Option<&str>,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut signature = None;
        let mut timestamp = None;

        for (name, value) in headers {
            if name.eq_ignore_ascii_case(&config.signature_header) {
                signature = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(&config.timestamp_header) {
                timestamp = Some(value.to_string());
            }
        }

        Self {
            body: body.into(),
            signature,
            timestamp,
            source: source.map(String::from),
        }
    }

    /// Source label for logging.
    pub fn source_label(&self) -> &str {
        self.source.as_deref().unwrap_or("-")
    }
}

/// An event parsed from a payload whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedEvent {
    /// Identifies this event instance (for deduplication and logging).
    pub id: String,

    /// Event kind, e.g. `license.created`.
    pub kind: String,

    /// Kind-specific payload.
    pub data: Map<String, Value>,

    /// When the event was generated upstream.
    pub timestamp: Option<DateTime<Utc>>,

    /// Seller on whose behalf the event was raised.
    pub source_id: Option<String>,
}

impl VerifiedEvent {
    /// Tie the event to the route source whose secret verified it.
    ///
    /// A payload naming another seller is rejected with `SourceMismatch`.
    /// A payload naming none takes the route source. Without a route source
    /// the payload's claim is kept as is.
    pub fn bind_source(&mut self, route: Option<&str>) -> Result<(), WebhookError> {
        let Some(route) = route else {
            return Ok(());
        };
        match self.source_id.as_deref() {
            Some(claimed) if claimed != route => Err(WebhookError::SourceMismatch {
                route: route.to_string(),
                claimed: claimed.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.source_id = Some(route.to_string());
                Ok(())
            }
        }
    }
}

/// Derive a stable event id from the raw payload.
///
/// Repeated deliveries of the same bytes share an id.
pub fn derive_event_id(payload: &[u8]) -> String {
    let hash = hex::encode(Sha256::digest(payload));
    format!("evt_{}", &hash[..32])
}

fn optional_string(
    obj: &Map<String, Value>,
    keys: &[&str],
) -> Result<Option<String>, WebhookError> {
    for key in keys {
        match obj.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => return Ok(Some(s.clone())),
            Some(_) => {
                return Err(WebhookError::MalformedEvent(format!(
                    "field {:?} must be a string",
                    key
                )))
            }
        }
    }
    Ok(None)
}

/// Parse a verified payload into a [`VerifiedEvent`].
///
/// Requires a non-empty `event` (or `type`) string and a `data` object.
/// `id`, `timestamp` (RFC 3339) and `sellerId` (or `sourceId`) are optional.
pub fn parse_event(payload: &[u8]) -> Result<VerifiedEvent, WebhookError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::MalformedEvent(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut obj) = value else {
        return Err(WebhookError::MalformedEvent(
            "body must be a JSON object".to_string(),
        ));
    };

    let kind = optional_string(&obj, &["event", "type"])?
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| WebhookError::MalformedEvent("missing event kind".to_string()))?;

    let data = match obj.remove("data") {
        Some(Value::Object(data)) => data,
        Some(_) => {
            return Err(WebhookError::MalformedEvent(
                "data must be an object".to_string(),
            ))
        }
        None => return Err(WebhookError::MalformedEvent("missing data".to_string())),
    };

    let id = optional_string(&obj, &["id"])?.unwrap_or_else(|| derive_event_id(payload));

    let timestamp = optional_string(&obj, &["timestamp"])?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    WebhookError::MalformedEvent(format!("invalid timestamp {:?}: {}", raw, e))
                })
        })
        .transpose()?;

    let source_id = optional_string(&obj, &["sellerId", "sourceId"])?;

    Ok(VerifiedEvent {
        id,
        kind,
        data,
        timestamp,
        source_id,
    })
}
