//! Event handler trait.

use crate::protocol::models::VerifiedEvent;
use crate::WebhookError;

/// Application logic for one event kind.
///
/// Handlers run synchronously on the request path. Any I/O they perform is
/// subject to their own timeout policy; the dispatcher imposes none.
///
/// Closures with the matching signature implement this trait:
///
/// ```
/// use sellerhook::{HandlerRegistry, VerifiedEvent, WebhookError};
///
/// let mut registry = HandlerRegistry::new();
/// registry.register("license.created", |event: &VerifiedEvent| {
///     println!("new license {}", event.data["id"]);
///     Ok::<(), WebhookError>(())
/// });
/// ```
pub trait EventHandler: Send + Sync {
    /// Handle a verified event.
    fn handle(&self, event: &VerifiedEvent) -> Result<(), WebhookError>;
}

impl<F> EventHandler for F
where
    F: Fn(&VerifiedEvent) -> Result<(), WebhookError> + Send + Sync,
{
    fn handle(&self, event: &VerifiedEvent) -> Result<(), WebhookError> {
        self(event)
    }
}
