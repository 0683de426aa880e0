//! HMAC-SHA256 signature creation and constant-time verification.
//!
//! The signing input is always the raw request body exactly as received.
//! Re-serializing a parsed body (key order, whitespace, number formatting)
//! produces different bytes and a different digest.

use crate::clock::Clock;
use crate::config::WebhookConfig;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 digest in bytes.
pub const SIGNATURE_LEN: usize = 32;

/// Optional prefix some senders put in front of the hex digest.
const SHA256_PREFIX: &str = "sha256=";

fn digest(payload: &[u8], secret: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Compute the lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
pub fn create_signature(payload: &[u8], secret: &[u8]) -> String {
    hex::encode(digest(payload, secret))
}

/// Decode a submitted signature into raw digest bytes.
///
/// Accepts surrounding whitespace and an optional `sha256=` prefix.
fn decode_signature(signature_hex: &str) -> Option<Vec<u8>> {
    let sig = signature_hex.trim();
    let sig = sig.strip_prefix(SHA256_PREFIX).unwrap_or(sig);
    hex::decode(sig).ok()
}

/// Check `signature_hex` against the expected signature for `payload`.
///
/// Undecodable or wrong-length signatures return `false`; equal-length
/// digests are compared in constant time.
pub fn verify_signature(payload: &[u8], signature_hex: &str, secret: &[u8]) -> bool {
    let Some(provided) = decode_signature(signature_hex) else {
        return false;
    };

    if provided.len() != SIGNATURE_LEN {
        return false;
    }

    let expected = digest(payload, secret);
    expected[..].ct_eq(provided.as_slice()).into()
}

/// Headers a sender attaches to a signed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// `(header name, hex signature)`.
    pub signature: (String, String),
    /// `(header name, epoch seconds)`.
    pub timestamp: (String, String),
}

impl SignatureHeaders {
    /// Both headers as `(name, value)` pairs.
    pub fn pairs(&self) -> [(&str, &str); 2] {
        [
            (self.signature.0.as_str(), self.signature.1.as_str()),
            (self.timestamp.0.as_str(), self.timestamp.1.as_str()),
        ]
    }
}

/// Build the signature and timestamp headers for `payload`.
pub fn build_signature_headers(
    config: &WebhookConfig,
    payload: &[u8],
    clock: &dyn Clock,
) -> SignatureHeaders {
    let timestamp = clock.now_utc().timestamp().to_string();
    let signature = create_signature(payload, &config.secret);

    SignatureHeaders {
        signature: (config.signature_header.clone(), signature),
        timestamp: (config.timestamp_header.clone(), timestamp),
    }
}
