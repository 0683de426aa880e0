//! Secret resolution for webhook sources.
//!
//! A source label (usually the seller id taken from the route) selects which
//! key verifies a request. The label is untrusted until the signature checks
//! out; it only picks a key.

use crate::WebhookError;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Resolves the HMAC key for a request source.
pub trait SecretStore: Send + Sync {
    /// Secret for the given source, or `None` if the source is unknown.
    fn secret_for(&self, source_id: Option<&str>) -> Option<Vec<u8>>;
}

/// A single secret shared by every source.
#[derive(Clone)]
pub struct StaticSecret {
    secret: Vec<u8>,
}

impl StaticSecret {
    /// Wrap a shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl SecretStore for StaticSecret {
    fn secret_for(&self, _source_id: Option<&str>) -> Option<Vec<u8>> {
        Some(self.secret.clone())
    }
}

impl fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSecret").finish_non_exhaustive()
    }
}

/// Per-seller secrets with an optional fallback.
#[derive(Clone, Default)]
pub struct TenantSecrets {
    secrets: HashMap<String, Vec<u8>>,
    fallback: Option<Vec<u8>>,
}

impl TenantSecrets {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the secret for a source.
    pub fn insert(&mut self, source_id: impl Into<String>, secret: impl Into<Vec<u8>>) {
        self.secrets.insert(source_id.into(), secret.into());
    }

    /// Secret used when the source is absent or not listed.
    pub fn with_fallback(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.fallback = Some(secret.into());
        self
    }

    /// Number of per-source secrets.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether no per-source secrets are configured.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Load secrets from a JSON object of `{"<source id>": "<secret>"}`.
    pub fn from_json_file(path: &Path) -> Result<Self, WebhookError> {
        let json = fs::read_to_string(path).map_err(|e| {
            WebhookError::ConfigError(format!("Failed to read secrets file: {}", e))
        })?;
        Self::from_json(&json)
    }

    /// Parse secrets from a JSON object of `{"<source id>": "<secret>"}`.
    pub fn from_json(json: &str) -> Result<Self, WebhookError> {
        let raw: HashMap<String, String> = serde_json::from_str(json).map_err(|e| {
            WebhookError::ConfigError(format!("Failed to parse secrets file: {}", e))
        })?;

        let mut store = Self::new();
        for (source_id, secret) in raw {
            if secret.is_empty() {
                return Err(WebhookError::ConfigError(format!(
                    "empty secret for source {}",
                    source_id
                )));
            }
            store.insert(source_id, secret);
        }
        Ok(store)
    }
}

impl SecretStore for TenantSecrets {
    fn secret_for(&self, source_id: Option<&str>) -> Option<Vec<u8>> {
        source_id
            .and_then(|id| self.secrets.get(id))
            .or(self.fallback.as_ref())
            .cloned()
    }
}

impl fmt::Debug for TenantSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&String> = self.secrets.keys().collect();
        sources.sort();
        f.debug_struct("TenantSecrets")
            .field("sources", &sources)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
