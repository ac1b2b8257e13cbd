pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;

use std::sync::Arc;

use crate::middleware::rate_limit::RateLimiter;
use crate::observability::Logger;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub logger: Logger,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: config::AppConfig, logger: Logger) -> Self {
        let limiter = Arc::new(RateLimiter::per_minute(config.rate_limit_per_minute));
        Self {
            config: Arc::new(config),
            logger,
            limiter,
        }
    }
}
