//! Axum extractors and middleware layers.

pub mod auth;
pub mod rate_limit;
pub mod request_log;
pub mod validated_json;
