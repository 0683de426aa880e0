//! Event kinds emitted by the licensing platform.
//!
//! Routing is keyed by plain strings, so kinds missing from this list still
//! dispatch if a handler is registered for them.

/// A license was issued.
pub const LICENSE_CREATED: &str = "license.created";
/// License attributes changed.
pub const LICENSE_UPDATED: &str = "license.updated";
/// A license was activated on a machine.
pub const LICENSE_ACTIVATED: &str = "license.activated";
/// A license was revoked by the seller.
pub const LICENSE_REVOKED: &str = "license.revoked";
/// A license reached its expiry.
pub const LICENSE_EXPIRED: &str = "license.expired";
/// A payment settled.
pub const PAYMENT_COMPLETED: &str = "payment.completed";
/// A payment attempt failed.
pub const PAYMENT_FAILED: &str = "payment.failed";
/// A payment was refunded.
pub const PAYMENT_REFUNDED: &str = "payment.refunded";
/// A customer account was created.
pub const USER_CREATED: &str = "user.created";
/// A customer account changed.
pub const USER_UPDATED: &str = "user.updated";

/// Every kind listed above.
pub const ALL: &[&str] = &[
    LICENSE_CREATED,
    LICENSE_UPDATED,
    LICENSE_ACTIVATED,
    LICENSE_REVOKED,
    LICENSE_EXPIRED,
    PAYMENT_COMPLETED,
    PAYMENT_FAILED,
    PAYMENT_REFUNDED,
    USER_CREATED,
    USER_UPDATED,
];

/// Whether `kind` is one the platform is known to emit.
pub fn is_known(kind: &str) -> bool {
    ALL.contains(&kind)
}

/// Resource family of a kind (`license.created` -> `license`).
pub fn family(kind: &str) -> &str {
    kind.split_once('.').map(|(family, _)| family).unwrap_or(kind)
}
