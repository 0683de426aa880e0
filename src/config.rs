//! Webhook verifier configuration.

use crate::WebhookError;
use std::fmt;
use std::time::Duration;

/// Default replay window (5 minutes).
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Default name of the header carrying the hex HMAC signature.
pub const DEFAULT_SIGNATURE_HEADER: &str = "Signature";

/// Default name of the header carrying the epoch-seconds timestamp.
pub const DEFAULT_TIMESTAMP_HEADER: &str = "Timestamp";

/// Environment variable holding the shared webhook secret.
pub const ENV_SECRET: &str = "SELLERHOOK_WEBHOOK_SECRET";
/// Environment variable overriding the tolerance, in seconds.
pub const ENV_TOLERANCE_SECS: &str = "SELLERHOOK_TOLERANCE_SECS";
/// Environment variable overriding the signature header name.
pub const ENV_SIGNATURE_HEADER: &str = "SELLERHOOK_SIGNATURE_HEADER";
/// Environment variable overriding the timestamp header name.
pub const ENV_TIMESTAMP_HEADER: &str = "SELLERHOOK_TIMESTAMP_HEADER";

/// Immutable configuration for one verifier.
///
/// Built once and shared read-only; nothing in the pipeline mutates it.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Shared HMAC key.
    pub secret: Vec<u8>,

    /// Maximum allowed distance between the request timestamp and now.
    pub tolerance: Duration,

    /// Header carrying the hex signature.
    pub signature_header: String,

    /// Header carrying the epoch-seconds timestamp.
    pub timestamp_header: String,
}

impl WebhookConfig {
    /// Create a configuration with default tolerance and header names.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            timestamp_header: DEFAULT_TIMESTAMP_HEADER.to_string(),
        }
    }

    /// Override the replay window.
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Override the signature and timestamp header names.
    pub fn with_headers(
        mut self,
        signature_header: impl Into<String>,
        timestamp_header: impl Into<String>,
    ) -> Self {
        self.signature_header = signature_header.into();
        self.timestamp_header = timestamp_header.into();
        self
    }

    /// Load configuration from `SELLERHOOK_*` environment variables.
    pub fn from_env() -> Result<Self, WebhookError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// The secret is required; every other key falls back to its default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WebhookError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(ENV_SECRET)
            .ok_or_else(|| WebhookError::ConfigError(format!("{} is not set", ENV_SECRET)))?;

        let mut config = Self::new(secret);

        if let Some(raw) = lookup(ENV_TOLERANCE_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                WebhookError::ConfigError(format!(
                    "{} must be a whole number of seconds, got {:?}",
                    ENV_TOLERANCE_SECS, raw
                ))
            })?;
            config.tolerance = Duration::from_secs(secs);
        }
        if let Some(name) = lookup(ENV_SIGNATURE_HEADER) {
            config.signature_header = name;
        }
        if let Some(name) = lookup(ENV_TIMESTAMP_HEADER) {
            config.timestamp_header = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), WebhookError> {
        if self.secret.is_empty() {
            return Err(WebhookError::ConfigError(
                "secret cannot be empty".to_string(),
            ));
        }
        if self.tolerance.is_zero() {
            return Err(WebhookError::ConfigError(
                "tolerance must be greater than zero".to_string(),
            ));
        }
        if self.signature_header.trim().is_empty() || self.timestamp_header.trim().is_empty() {
            return Err(WebhookError::ConfigError(
                "header names cannot be empty".to_string(),
            ));
        }
        if self
            .signature_header
            .eq_ignore_ascii_case(&self.timestamp_header)
        {
            return Err(WebhookError::ConfigError(format!(
                "signature and timestamp headers must differ, both are {:?}",
                self.signature_header
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .field("signature_header", &self.signature_header)
            .field("timestamp_header", &self.timestamp_header)
            .finish()
    }
}
