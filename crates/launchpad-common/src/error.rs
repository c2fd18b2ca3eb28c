use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Why a launch attempt did not reach `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchFailureReason {
    Fatal,
    Timeout,
    Cancelled,
}

impl LaunchFailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            LaunchFailureReason::Fatal => "fatal",
            LaunchFailureReason::Timeout => "timeout",
            LaunchFailureReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("launch failure ({reason:?}): {message}")]
    LaunchFailure {
        reason: LaunchFailureReason,
        message: String,
        log_file: Option<String>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({"error": {"message": msg}}),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({"error": {"message": msg}}),
            ),
            // Launch failures are a property of the launch attempt, not the
            // HTTP request: the request succeeded, the launch did not.
            AppError::LaunchFailure { reason, message, log_file } => (
                StatusCode::OK,
                json!({"success": false, "reason": reason.as_str(), "message": message, "log_file": log_file}),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": {"message": "internal error"}}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
