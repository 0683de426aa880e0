//! Cryptographic primitives for request verification.

pub mod freshness;
pub mod pipeline;
pub mod signing;
