//! Request freshness enforcement (replay attack prevention).

use crate::clock::Clock;
use crate::WebhookError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Parse a timestamp header holding decimal seconds since the Unix epoch.
///
/// Example: "1704067200"
pub fn parse_epoch_timestamp(value: &str) -> Result<DateTime<Utc>, WebhookError> {
    let trimmed = value.trim();
    let secs: i64 = trimmed
        .parse()
        .map_err(|_| WebhookError::MalformedTimestamp(format!("not an integer: {:?}", trimmed)))?;

    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| WebhookError::MalformedTimestamp(format!("out of range: {}", secs)))
}

/// Check that a request timestamp lies within `tolerance` of now.
///
/// The window is symmetric: it bounds replays of old requests and clock
/// skew on future-dated ones alike. A distance of exactly `tolerance` is
/// accepted.
///
/// # Errors
/// * `StaleRequest` - `|now - timestamp|` exceeds `tolerance`
pub fn check_freshness<C: Clock + ?Sized>(
    timestamp: DateTime<Utc>,
    tolerance: Duration,
    clock: &C,
) -> Result<(), WebhookError> {
    let now = clock.now_utc();
    let age_seconds = (now - timestamp).num_seconds();

    if age_seconds.unsigned_abs() > tolerance.as_secs() {
        return Err(WebhookError::StaleRequest { age_seconds });
    }

    Ok(())
}

/// Combined parse and check freshness.
pub fn check_timestamp_freshness<C: Clock + ?Sized>(
    timestamp_header: &str,
    tolerance: Duration,
    clock: &C,
) -> Result<DateTime<Utc>, WebhookError> {
    let timestamp = parse_epoch_timestamp(timestamp_header)?;
    check_freshness(timestamp, tolerance, clock)?;
    Ok(timestamp)
}
