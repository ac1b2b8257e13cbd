//! Log-generation endpoints for checking the aggregator pipeline end to end.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::observability::LogRecord;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub item_id: i64,
    pub message: &'static str,
}

/// GET /api/v1/test/
pub async fn root(State(state): State<AppState>) -> Json<MessageResponse> {
    state.logger.emit(
        LogRecord::info("test_access")
            .message("Test root endpoint accessed")
            .field("endpoint", "/test/"),
    );
    Json(MessageResponse {
        message: "Test endpoint working",
    })
}

/// GET /api/v1/test/logs/{item_id} -- negative ids are rejected with 400.
pub async fn item_logs(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> Result<Json<ItemResponse>, AppError> {
    let endpoint = format!("/logs/{item_id}");
    state.logger.emit(
        LogRecord::info("item_access")
            .message(format!("Accessed item {item_id}"))
            .field("endpoint", endpoint.as_str())
            .field("item_id", item_id),
    );

    if item_id < 0 {
        state.logger.emit(
            LogRecord::error("item_access_error")
                .message("Invalid item ID")
                .field("endpoint", endpoint.as_str())
                .field("item_id", item_id)
                .field("error", "Item ID cannot be negative"),
        );
        return Err(AppError::BadRequest("Item ID cannot be negative".to_string()));
    }

    Ok(Json(ItemResponse {
        item_id,
        message: "Item accessed successfully",
    }))
}

/// GET /api/v1/test/error -- always fails with 500.
pub async fn error(State(state): State<AppState>) -> AppError {
    state.logger.emit(
        LogRecord::error("test_error")
            .message("Test error endpoint accessed")
            .field("endpoint", "/error")
            .field("error", "Intentional test error"),
    );
    AppError::Internal("Test error".to_string())
}

/// GET /api/v1/test/test-logs -- one event per level plus an error-typed event.
pub async fn test_logs(State(state): State<AppState>) -> Json<MessageResponse> {
    const ENDPOINT: &str = "/api/v1/test/test-logs";

    state.logger.emit(
        LogRecord::debug("test_debug")
            .message("This is a debug message")
            .field("endpoint", ENDPOINT),
    );
    state.logger.emit(
        LogRecord::info("test_info")
            .message("This is an info message")
            .field("endpoint", ENDPOINT),
    );
    state.logger.emit(
        LogRecord::warning("test_warning")
            .message("This is a warning message")
            .field("endpoint", ENDPOINT),
    );
    state.logger.emit(
        LogRecord::error("test_error")
            .message("This is an error message")
            .field("endpoint", ENDPOINT),
    );

    let err = AppError::Validation("Test exception".to_string());
    state.logger.emit(
        LogRecord::error("test_exception")
            .message(err.to_string())
            .field("endpoint", ENDPOINT)
            .field("error", err.to_string())
            .field("error_type", "AppError::Validation"),
    );

    Json(MessageResponse {
        message: "Logs generated successfully",
    })
}
