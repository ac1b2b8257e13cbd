//! Route definitions and router assembly for the gateway API.

pub mod diagnostics;
pub mod health;
pub mod security;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::ConfigError;
use crate::middleware::{rate_limit, request_log};
use crate::AppState;

/// Build the full application router, layers included.
///
/// Shared by `main` and the integration tests.
pub fn build_router(state: AppState) -> Result<Router, ConfigError> {
    let security_routes = Router::new()
        .route("/security/check", post(security::check))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/secure", get(health::secure_health));

    let test_routes = Router::new()
        .route("/test/", get(diagnostics::root))
        .route("/test/logs/{item_id}", get(diagnostics::item_logs))
        .route("/test/error", get(diagnostics::error))
        .route("/test/test-logs", get(diagnostics::test_logs));

    let api = Router::new()
        .merge(security_routes)
        .merge(health_routes)
        .merge(test_routes);

    let prefix = state.config.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        Router::new().merge(api)
    } else if prefix.starts_with('/') {
        Router::new().nest(prefix, api)
    } else {
        return Err(ConfigError::Invalid {
            key: "API_V1_PREFIX",
            value: state.config.api_prefix.clone(),
        });
    };

    let cors = cors_layer(&state.config.cors_origins)?;
    let body_limit = usize::try_from(state.config.request_body_limit_kb.saturating_mul(1024))
        .unwrap_or(usize::MAX);

    Ok(app
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_log::request_logging,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// CORS for the configured origins. Credentials are allowed, so methods and
/// headers mirror the preflight instead of using `*`.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let origins = origins
        .iter()
        .map(|origin| {
            if origin == "*" {
                return Err(ConfigError::Invalid {
                    key: "CORS_ORIGINS",
                    value: origin.clone(),
                });
            }
            HeaderValue::from_str(origin).map_err(|_| ConfigError::Invalid {
                key: "CORS_ORIGINS",
                value: origin.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}
