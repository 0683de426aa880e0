//! Sellerhook error types.

use thiserror::Error;

/// Pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    /// Credential, freshness or signature checks.
    Verification,
    /// Deserializing a verified payload into an event.
    Parse,
    /// Running the registered handler.
    Dispatch,
    /// Configuration and outbound transport.
    Other,
}

/// Errors that can occur while receiving, verifying or dispatching webhooks.
///
/// Messages never include secret material or the submitted signature.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Signature or timestamp header is missing (fail-closed).
    #[error("Webhook signature or timestamp header missing")]
    MissingCredentials,

    /// Timestamp header is not a decimal epoch-seconds value.
    #[error("Malformed webhook timestamp: {0}")]
    MalformedTimestamp(String),

    /// Request timestamp falls outside the tolerance window (replay or skew).
    #[error("Webhook timestamp outside tolerance ({age_seconds}s), possible replay")]
    StaleRequest {
        /// Age of the request in seconds; negative when future-dated.
        age_seconds: i64,
    },

    /// Signature did not match the raw request body.
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    /// No secret could be resolved for the request's source.
    #[error("No webhook secret configured for source: {0}")]
    UnknownSource(String),

    /// The payload names a different seller than the authenticated route.
    #[error("Webhook payload claims source {claimed:?} but was signed for {route:?}")]
    SourceMismatch {
        /// Source label of the route whose secret verified the request.
        route: String,
        /// Source named in the payload's `sellerId`/`sourceId`.
        claimed: String,
    },

    /// Verified payload is not a well-formed event.
    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),

    /// A registered handler reported failure.
    #[error("Webhook handler failed: {0}")]
    HandlerFailed(String),

    /// HTTP transport error while delivering an outbound webhook.
    #[error("Webhook transport error: {0}")]
    Transport(String),
}

impl WebhookError {
    /// Pipeline stage that produced this error.
    pub fn stage(&self) -> ErrorStage {
        match self {
            WebhookError::MissingCredentials
            | WebhookError::MalformedTimestamp(_)
            | WebhookError::StaleRequest { .. }
            | WebhookError::InvalidSignature
            | WebhookError::UnknownSource(_)
            | WebhookError::SourceMismatch { .. } => ErrorStage::Verification,
            WebhookError::MalformedEvent(_) => ErrorStage::Parse,
            WebhookError::HandlerFailed(_) => ErrorStage::Dispatch,
            WebhookError::ConfigError(_) | WebhookError::Transport(_) => ErrorStage::Other,
        }
    }

    /// HTTP status the boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::MissingCredentials
            | WebhookError::StaleRequest { .. }
            | WebhookError::InvalidSignature
            | WebhookError::UnknownSource(_)
            | WebhookError::SourceMismatch { .. } => 401,
            WebhookError::MalformedTimestamp(_) | WebhookError::MalformedEvent(_) => 400,
            WebhookError::ConfigError(_)
            | WebhookError::HandlerFailed(_)
            | WebhookError::Transport(_) => 500,
        }
    }

    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookError::ConfigError(_) => "config",
            WebhookError::MissingCredentials => "missing_credentials",
            WebhookError::MalformedTimestamp(_) => "malformed_timestamp",
            WebhookError::StaleRequest { .. } => "stale_request",
            WebhookError::InvalidSignature => "invalid_signature",
            WebhookError::UnknownSource(_) => "unknown_source",
            WebhookError::SourceMismatch { .. } => "source_mismatch",
            WebhookError::MalformedEvent(_) => "malformed_event",
            WebhookError::HandlerFailed(_) => "handler_failed",
            WebhookError::Transport(_) => "transport",
        }
    }
}
