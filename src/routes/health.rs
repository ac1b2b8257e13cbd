//! Health check endpoints.

use axum::{extract::Request, Json};
use serde::Serialize;

use crate::middleware::auth::ExpressAuth;
use crate::middleware::request_log::client_host;
use crate::observability::SERVICE_NAME;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
}

/// Authenticated health detail, confirming the caller passed the Origin Guard.
#[derive(Debug, Serialize)]
pub struct SecureHealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub client: Option<String>,
    pub authenticated: bool,
}

/// GET /api/v1/health -- unauthenticated liveness probe.
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

/// GET /api/v1/health/secure -- requires the Express API key.
pub async fn secure_health(_auth: ExpressAuth, request: Request) -> Json<SecureHealthStatus> {
    Json(SecureHealthStatus {
        status: "healthy",
        service: SERVICE_NAME,
        client: client_host(request.extensions()),
        authenticated: true,
    })
}
