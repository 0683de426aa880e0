//! Verification pipeline composing all request checks.
//!
//! This module provides the unified verification flow:
//! 1. Check signature and timestamp headers are present (fail-closed)
//! 2. Parse the timestamp
//! 3. Check freshness (not replayed, not future-dated beyond tolerance)
//! 4. Resolve the secret and verify the HMAC over the raw body

use crate::clock::Clock;
use crate::config::WebhookConfig;
use crate::crypto::{freshness::check_timestamp_freshness, signing::verify_signature};
use crate::protocol::models::IncomingRequest;
use crate::secrets::SecretStore;
use crate::WebhookError;

fn log_rejection(req: &IncomingRequest, error: &WebhookError) {
    match error {
        WebhookError::StaleRequest { age_seconds } => tracing::warn!(
            source = req.source_label(),
            reason = error.kind(),
            age_seconds = *age_seconds,
            "Webhook rejected"
        ),
        _ => tracing::warn!(
            source = req.source_label(),
            reason = error.kind(),
            "Webhook rejected"
        ),
    }
}

/// Steps 1-3, which need no secret. Returns the submitted signature.
fn check_credentials<'r>(
    req: &'r IncomingRequest,
    config: &WebhookConfig,
    clock: &dyn Clock,
) -> Result<&'r str, WebhookError> {
    // 1. Fail-closed on missing credentials
    let signature = req
        .signature
        .as_deref()
        .ok_or(WebhookError::MissingCredentials)?;

    let timestamp = req
        .timestamp
        .as_deref()
        .ok_or(WebhookError::MissingCredentials)?;

    // 2-3. Parse timestamp and check the replay window
    check_timestamp_freshness(timestamp, config.tolerance, clock)?;

    Ok(signature)
}

/// Step 4: HMAC over the raw body, never a re-encoded structure.
fn check_signature<'r>(
    req: &'r IncomingRequest,
    signature: &str,
    secret: &[u8],
) -> Result<&'r [u8], WebhookError> {
    if !verify_signature(&req.body, signature, secret) {
        return Err(WebhookError::InvalidSignature);
    }
    Ok(&req.body)
}

/// Verify an inbound request's authenticity and freshness.
///
/// Uses `config.secret` as the key.
///
/// # Returns
/// * `Ok(body)` - The verified raw payload, ready for parsing
/// * `Err(MissingCredentials)` - Signature or timestamp header absent
/// * `Err(MalformedTimestamp)` - Timestamp is not epoch seconds
/// * `Err(StaleRequest)` - Timestamp outside `config.tolerance`
/// * `Err(InvalidSignature)` - HMAC mismatch
pub fn verify_request<'r>(
    req: &'r IncomingRequest,
    config: &WebhookConfig,
    clock: &dyn Clock,
) -> Result<&'r [u8], WebhookError> {
    check_credentials(req, config, clock)
        .and_then(|signature| check_signature(req, signature, &config.secret))
        .map_err(|e| {
            log_rejection(req, &e);
            e
        })
}

/// Verify an inbound request, resolving the key through a [`SecretStore`].
///
/// The request's source label selects the secret. The lookup happens only
/// after the credential and freshness checks pass, so `UnknownSource` is
/// reported for otherwise well-formed, fresh requests alone.
pub fn verify_request_with<'r>(
    req: &'r IncomingRequest,
    secrets: &dyn SecretStore,
    config: &WebhookConfig,
    clock: &dyn Clock,
) -> Result<&'r [u8], WebhookError> {
    check_credentials(req, config, clock)
        .and_then(|signature| {
            let secret = secrets
                .secret_for(req.source.as_deref())
                .ok_or_else(|| WebhookError::UnknownSource(req.source_label().to_string()))?;
            check_signature(req, signature, &secret)
        })
        .map_err(|e| {
            log_rejection(req, &e);
            e
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::crypto::signing::create_signature;
    use crate::secrets::TenantSecrets;
    use std::time::Duration;

    const NOW: i64 = 1_704_067_200;
    const BODY: &str = r#"{"event":"license.created","data":{"id":"lic_1"},"timestamp":"2024-01-01T00:00:00Z","sellerId":"seller_1"}"#;

    fn signed_request(body: &str, secret: &[u8], timestamp: i64) -> IncomingRequest {
        IncomingRequest {
            body: body.as_bytes().to_vec(),
            signature: Some(create_signature(body.as_bytes(), secret)),
            timestamp: Some(timestamp.to_string()),
            source: Some("seller_1".to_string()),
        }
    }

    fn config() -> WebhookConfig {
        WebhookConfig::new("s3cr3t")
    }

    #[test]
    fn test_verify_request_valid() {
        let clock = MockClock::from_unix(NOW);
        let req = signed_request(BODY, b"s3cr3t", NOW);

        let body = verify_request(&req, &config(), &clock).unwrap();
        assert_eq!(body, BODY.as_bytes());
    }

    #[test]
    fn test_missing_signature() {
        let clock = MockClock::from_unix(NOW);
        let mut req = signed_request(BODY, b"s3cr3t", NOW);
        req.signature = None;

        let result = verify_request(&req, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::MissingCredentials)));
    }

    #[test]
    fn test_missing_timestamp() {
        let clock = MockClock::from_unix(NOW);
        let mut req = signed_request(BODY, b"s3cr3t", NOW);
        req.timestamp = None;

        let result = verify_request(&req, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::MissingCredentials)));
    }

    #[test]
    fn test_malformed_timestamp() {
        let clock = MockClock::from_unix(NOW);
        let mut req = signed_request(BODY, b"s3cr3t", NOW);
        req.timestamp = Some("Mon, 01 Jan 2024 00:00:00 GMT".to_string());

        let result = verify_request(&req, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::MalformedTimestamp(_))));
    }

    #[test]
    fn test_stale_even_with_valid_signature() {
        let clock = MockClock::from_unix(NOW);
        let req = signed_request(BODY, b"s3cr3t", NOW - 600);

        let result = verify_request(&req, &config(), &clock);
        assert!(matches!(
            result,
            Err(WebhookError::StaleRequest { age_seconds: 600 })
        ));
    }

    #[test]
    fn test_window_boundaries() {
        let clock = MockClock::from_unix(NOW);
        for offset in [-300, -1, 0, 1, 300] {
            let req = signed_request(BODY, b"s3cr3t", NOW + offset);
            assert!(verify_request(&req, &config(), &clock).is_ok());
        }
        for offset in [-301, 301, -86_400] {
            let req = signed_request(BODY, b"s3cr3t", NOW + offset);
            assert!(matches!(
                verify_request(&req, &config(), &clock),
                Err(WebhookError::StaleRequest { .. })
            ));
        }
    }

    #[test]
    fn test_custom_tolerance() {
        let clock = MockClock::from_unix(NOW);
        let config = config().with_tolerance(Duration::from_secs(900));
        let req = signed_request(BODY, b"s3cr3t", NOW - 600);
        assert!(verify_request(&req, &config, &clock).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let clock = MockClock::from_unix(NOW);
        let mut req = signed_request(BODY, b"s3cr3t", NOW);
        let mut sig = req.signature.take().unwrap();
        let last = if sig.ends_with('0') { "1" } else { "0" };
        sig.replace_range(63..64, last);
        req.signature = Some(sig);

        let result = verify_request(&req, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn test_reencoded_body_fails() {
        let clock = MockClock::from_unix(NOW);
        let mut req = signed_request(BODY, b"s3cr3t", NOW);
        let reparsed: serde_json::Value = serde_json::from_str(BODY).unwrap();
        req.body = serde_json::to_vec_pretty(&reparsed).unwrap();

        let result = verify_request(&req, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn test_staleness_checked_before_signature() {
        let clock = MockClock::from_unix(NOW);
        let mut req = signed_request(BODY, b"s3cr3t", NOW - 600);
        req.signature = Some("00".repeat(32));

        let result = verify_request(&req, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::StaleRequest { .. })));
    }

    #[test]
    fn test_verify_with_tenant_secret() {
        let clock = MockClock::from_unix(NOW);
        let mut secrets = TenantSecrets::new();
        secrets.insert("seller_1", "tenant-one");

        let req = signed_request(BODY, b"tenant-one", NOW);
        assert!(verify_request_with(&req, &secrets, &config(), &clock).is_ok());

        let wrong_key = signed_request(BODY, b"s3cr3t", NOW);
        assert!(matches!(
            verify_request_with(&wrong_key, &secrets, &config(), &clock),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_with_unknown_source() {
        let clock = MockClock::from_unix(NOW);
        let secrets = TenantSecrets::new();
        let req = signed_request(BODY, b"s3cr3t", NOW);

        let result = verify_request_with(&req, &secrets, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::UnknownSource(ref s)) if s == "seller_1"));
    }

    #[test]
    fn test_unknown_source_missing_headers_reports_missing_credentials() {
        let clock = MockClock::from_unix(NOW);
        let secrets = TenantSecrets::new();
        let mut req = signed_request(BODY, b"s3cr3t", NOW);
        req.signature = None;
        req.timestamp = None;

        let result = verify_request_with(&req, &secrets, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::MissingCredentials)));
    }

    #[test]
    fn test_unknown_source_stale_reports_stale() {
        let clock = MockClock::from_unix(NOW);
        let secrets = TenantSecrets::new();
        let req = signed_request(BODY, b"s3cr3t", NOW - 600);

        let result = verify_request_with(&req, &secrets, &config(), &clock);
        assert!(matches!(
            result,
            Err(WebhookError::StaleRequest { age_seconds: 600 })
        ));
    }

    #[test]
    fn test_unknown_source_malformed_timestamp() {
        let clock = MockClock::from_unix(NOW);
        let secrets = TenantSecrets::new();
        let mut req = signed_request(BODY, b"s3cr3t", NOW);
        req.timestamp = Some("soon".to_string());

        let result = verify_request_with(&req, &secrets, &config(), &clock);
        assert!(matches!(result, Err(WebhookError::MalformedTimestamp(_))));
    }
}
