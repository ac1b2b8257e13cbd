//! Security check route.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::middleware::auth::ExpressAuth;
use crate::middleware::validated_json::ValidatedJson;
use crate::models::security::{RequestDescriptor, ThreatVerdict};
use crate::observability::LogRecord;
use crate::services::threat;
use crate::AppState;

/// POST /api/v1/security/check -- classify a request described by the Express server.
pub async fn check(
    State(state): State<AppState>,
    _auth: ExpressAuth,
    ValidatedJson(descriptor): ValidatedJson<RequestDescriptor>,
) -> Result<Json<ThreatVerdict>, AppError> {
    let verdict = threat::classify(&descriptor, state.config.max_body_size_kb);

    let record = if verdict.is_threat {
        LogRecord::warning("security_check").message("Threat detected")
    } else {
        LogRecord::info("security_check")
    };
    let categories: Vec<&str> = verdict.details.keys().map(|c| c.as_str()).collect();
    state.logger.emit(
        record
            .field("method", descriptor.method.as_str())
            .field("path", descriptor.path.as_str())
            .field("is_threat", verdict.is_threat)
            .field("threat_level", verdict.threat_level.to_string())
            .field("findings", categories),
    );

    Ok(Json(verdict))
}
