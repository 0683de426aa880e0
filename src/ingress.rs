//! Webhook ingress - the main public API for Sellerhook.
//!
//! `WebhookIngress` runs one inbound request through the full pipeline:
//! - Signature and freshness verification against the raw body
//! - Parsing into a typed event
//! - Dispatch to the handler registered for the event kind

use crate::clock::{Clock, SystemClock};
use crate::config::WebhookConfig;
use crate::crypto::pipeline::verify_request_with;
use crate::dispatch::router::{dispatch, DispatchOutcome, HandlerRegistry};
use crate::protocol::models::{parse_event, IncomingRequest};
use crate::secrets::{SecretStore, StaticSecret};
use crate::WebhookError;
use std::sync::Arc;

/// Verifies, parses and dispatches inbound webhooks.
///
/// Holds only read-only state, so one instance can serve concurrent
/// requests from many threads.
pub struct WebhookIngress {
    config: WebhookConfig,
    secrets: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    registry: HandlerRegistry,
}

impl WebhookIngress {
    /// Create an ingress that verifies every request with `config.secret`.
    ///
    /// Uses the system clock for freshness checks.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration fails validation.
    pub fn new(config: WebhookConfig, registry: HandlerRegistry) -> Result<Self, WebhookError> {
        config.validate()?;
        let secrets = Arc::new(StaticSecret::new(config.secret.clone()));
        Ok(Self {
            config,
            secrets,
            clock: Arc::new(SystemClock),
            registry,
        })
    }

    /// Resolve secrets per source instead of using `config.secret`.
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Create an ingress with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: WebhookConfig,
        registry: HandlerRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WebhookError> {
        let mut ingress = Self::new(config, registry)?;
        ingress.clock = clock;
        Ok(ingress)
    }

    /// Run one request through verification, parsing and dispatch.
    ///
    /// Never panics and never returns a process-fatal error; every failure
    /// is a [`DispatchOutcome`] the boundary layer maps to a status code.
    pub fn handle(&self, req: &IncomingRequest) -> DispatchOutcome {
        let payload = match verify_request_with(
            req,
            self.secrets.as_ref(),
            &self.config,
            self.clock.as_ref(),
        ) {
            Ok(payload) => payload,
            Err(e) => return DispatchOutcome::Rejected(e),
        };

        let mut event = match parse_event(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    source = req.source_label(),
                    reason = e.kind(),
                    error = %e,
                    "Verified webhook payload is malformed"
                );
                return DispatchOutcome::MalformedRejected(e);
            }
        };

        if let Err(e) = event.bind_source(req.source.as_deref()) {
            tracing::warn!(
                source = req.source_label(),
                reason = e.kind(),
                event_id = %event.id,
                "Webhook payload names another source"
            );
            return DispatchOutcome::Rejected(e);
        }

        dispatch(&event, &self.registry)
    }

    /// Build a request from raw headers and handle it.
    pub fn handle_raw<'a, I>(&self, body: &[u8], headers: I, source: Option<&str>) -> DispatchOutcome
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let req = IncomingRequest::from_headers(body, headers, &self.config, source);
        self.handle(&req)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Get the handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }
}
