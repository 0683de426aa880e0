//! Event routing from verified payloads to registered handlers.

pub mod handler;
pub mod idempotency;
pub mod router;
