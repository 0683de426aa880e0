//! Outbound HTTP client layer.

pub mod http;
