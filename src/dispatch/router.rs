//! Handler registry and single-event dispatch.

use crate::dispatch::handler::EventHandler;
use crate::protocol::kinds;
use crate::protocol::models::VerifiedEvent;
use crate::WebhookError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Terminal state of one inbound request.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Authentication failed; no handler ran.
    Rejected(WebhookError),
    /// Payload verified but is not a well-formed event.
    MalformedRejected(WebhookError),
    /// The handler for the event's kind succeeded.
    HandlerOk,
    /// The handler for the event's kind failed.
    HandlerFailed(String),
    /// No handler is registered for this kind.
    Unhandled(String),
}

impl DispatchOutcome {
    /// HTTP status the boundary layer should answer with.
    ///
    /// `Unhandled` acknowledges with 200 so the sender does not retry an
    /// event this service does not understand yet.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchOutcome::Rejected(e) => e.status_code(),
            DispatchOutcome::MalformedRejected(_) => 400,
            DispatchOutcome::HandlerOk | DispatchOutcome::Unhandled(_) => 200,
            DispatchOutcome::HandlerFailed(_) => 500,
        }
    }

    /// Whether the sender should treat the delivery as received.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::HandlerOk | DispatchOutcome::Unhandled(_)
        )
    }

    /// Whether the request was refused before reaching a handler.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Rejected(_) | DispatchOutcome::MalformedRejected(_)
        )
    }
}

/// Mapping from event kind to handler.
///
/// Adding an event kind is a registration, not a code change in the
/// dispatcher.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous handler.
    pub fn register<H>(&mut self, kind: impl Into<String>, handler: H) -> &mut Self
    where
        H: EventHandler + 'static,
    {
        let kind = kind.into();
        if self.handlers.insert(kind.clone(), Arc::new(handler)).is_some() {
            tracing::debug!(kind = %kind, "Replaced webhook handler");
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<H>(mut self, kind: impl Into<String>, handler: H) -> Self
    where
        H: EventHandler + 'static,
    {
        self.register(kind, handler);
        self
    }

    /// Whether a handler is registered for `kind`.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn get(&self, kind: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(kind)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

/// Route `event` to the handler registered for its kind.
///
/// Exactly one handler runs. An unknown kind is not an error and yields
/// `Unhandled`. Handler errors and panics yield `HandlerFailed`; the
/// registry stays usable for later events. No deduplication happens here:
/// dispatching the same event twice runs its handler twice.
pub fn dispatch(event: &VerifiedEvent, registry: &HandlerRegistry) -> DispatchOutcome {
    let Some(handler) = registry.get(&event.kind) else {
        tracing::info!(
            kind = %event.kind,
            event_id = %event.id,
            known_kind = kinds::is_known(&event.kind),
            "No handler registered for webhook event"
        );
        return DispatchOutcome::Unhandled(event.kind.clone());
    };

    let result = catch_unwind(AssertUnwindSafe(|| handler.handle(event)))
        .unwrap_or_else(|payload| Err(WebhookError::HandlerFailed(panic_message(&*payload))));

    match result {
        Ok(()) => {
            tracing::debug!(
                kind = %event.kind,
                event_id = %event.id,
                "Webhook event handled"
            );
            DispatchOutcome::HandlerOk
        }
        Err(e) => {
            let message = match e {
                WebhookError::HandlerFailed(message) => message,
                other => other.to_string(),
            };
            tracing::error!(
                kind = %event.kind,
                event_id = %event.id,
                error = %message,
                "Webhook handler failed"
            );
            DispatchOutcome::HandlerFailed(message)
        }
    }
}
