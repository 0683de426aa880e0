//! # Sellerhook
//!
//! **Signed webhook ingress for licensing-platform seller events.**
//!
//! Sellerhook authenticates inbound webhooks with HMAC-SHA256 over the raw
//! request body, rejects replays outside a timestamp tolerance window, and
//! routes each verified event to the handler registered for its kind.
//!
//! ## Features
//!
//! - **HMAC-SHA256 verification**: constant-time comparison of hex signatures
//! - **Replay window**: requests more than 5 minutes (configurable) from now are rejected
//! - **Raw-body signing**: the digest covers the exact bytes received
//! - **Per-seller secrets**: keys resolved through a pluggable `SecretStore`
//! - **Open dispatch table**: new event kinds are a registration, not a code change
//!
//! ## Quickstart
//!
//! ```no_run
//! use sellerhook::{HandlerRegistry, VerifiedEvent, WebhookConfig, WebhookError, WebhookIngress};
//!
//! fn main() -> Result<(), WebhookError> {
//!     let mut registry = HandlerRegistry::new();
//!     registry.register("license.created", |event: &VerifiedEvent| {
//!         println!("license {} created", event.data["id"]);
//!         Ok::<(), WebhookError>(())
//!     });
//!
//!     let ingress = WebhookIngress::new(WebhookConfig::from_env()?, registry)?;
//!
//!     // In the HTTP layer, with the body captured before any JSON parsing:
//!     let body = br#"{"event":"license.created","data":{"id":"lic_1"}}"#;
//!     let outcome = ingress.handle_raw(
//!         body,
//!         [("Signature", "<hex>"), ("Timestamp", "1704067200")],
//!         Some("seller_1"),
//!     );
//!     println!("respond with {}", outcome.status_code());
//!     Ok(())
//! }
//! ```
//!
//! ## Request lifecycle
//!
//! `Received -> Verifying -> {Rejected | Verified} -> Parsing ->
//! {MalformedRejected | Parsed} -> Dispatching -> {HandlerOk | HandlerFailed | Unhandled}`
//!
//! Nothing is retried here; senders retry on non-2xx responses.

#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;
pub mod secrets;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Dispatch layer
pub mod dispatch;

// Client layer
pub mod client;

// Ingress (main public API)
pub mod ingress;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::WebhookConfig;
pub use crypto::pipeline::{verify_request, verify_request_with};
pub use crypto::signing::{create_signature, verify_signature};
pub use dispatch::handler::EventHandler;
pub use dispatch::router::{dispatch, DispatchOutcome, HandlerRegistry};
pub use errors::WebhookError;
pub use ingress::WebhookIngress;
pub use protocol::models::{parse_event, IncomingRequest, VerifiedEvent};
pub use secrets::{SecretStore, StaticSecret, TenantSecrets};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
