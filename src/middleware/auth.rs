//! Origin Guard extractor for Axum handlers.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::observability::LogRecord;
use crate::services::origin_guard;
use crate::AppState;

/// Proof that the request passed the Origin Guard.
///
/// Use as an Axum extractor in handlers that only the Express server may call:
/// ```ignore
/// async fn handler(_auth: ExpressAuth) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExpressAuth;

impl FromRequestParts<AppState> for ExpressAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let config = &state.config;
        origin_guard::authorize(
            &parts.headers,
            &config.express_api_key,
            config.express_server_url.as_deref(),
        )
        .map_err(|err| {
            state.logger.emit(
                LogRecord::warning("auth_rejected")
                    .message(err.to_string())
                    .field("method", parts.method.as_str())
                    .field("path", parts.uri.path()),
            );
            err
        })?;

        Ok(ExpressAuth)
    }
}
