//! Request/response logging middleware.
//!
//! Every request gets a UUID v4 request id, echoed in the `x-request-id`
//! response header, and produces:
//! - `request_started` when it arrives
//! - `request_completed` when it finishes (warning level above the slow threshold)
//! - `request_failed` instead, when the response is a 5xx

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{header, Extensions, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use uuid::Uuid;

use crate::observability::LogRecord;
use crate::AppState;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Peer IP recorded by `into_make_service_with_connect_info`, if present.
pub fn client_host(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn request_logging(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client = client_host(request.extensions());
    let user_agent = header_str(request.headers(), header::USER_AGENT);
    let content_length =
        header_str(request.headers(), header::CONTENT_LENGTH).unwrap_or_else(|| "0".to_string());
    let query_params: BTreeMap<String, String> = Query::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    state.logger.emit(
        LogRecord::info("request_started")
            .field("request_id", request_id.as_str())
            .field("method", method.as_str())
            .field("path", path.as_str())
            .field("client_host", client.clone())
            .field("user_agent", user_agent.clone())
            .field("content_length", content_length.as_str()),
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    let query_params: serde_json::Map<String, Value> = query_params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    let base = |record: LogRecord| {
        record
            .field("request_id", request_id.as_str())
            .field("method", method.as_str())
            .field("path", path.as_str())
            .field("status_code", status.as_u16())
            .field("duration", duration.as_secs_f64())
            .field("client_host", client.clone())
            .field("query_params", query_params.clone())
            .field("user_agent", user_agent.clone())
    };

    let slow_threshold = Duration::from_millis(state.config.slow_request_threshold_ms);
    let record = if status.is_server_error() {
        base(LogRecord::error("request_failed"))
            .field("error", status.canonical_reason().unwrap_or("Server error"))
    } else {
        let response_size = header_str(response.headers(), header::CONTENT_LENGTH)
            .unwrap_or_else(|| "0".to_string());
        let completed = if duration > slow_threshold {
            LogRecord::warning("request_completed")
                .field("performance_warning", "Slow request detected")
        } else {
            LogRecord::info("request_completed")
        };
        base(completed)
            .field("content_length", content_length.as_str())
            .field("response_size", response_size)
    };

    state.logger.emit(record);
    response
}
