//! Webhook wire types and event parsing.

pub mod kinds;
pub mod models;
