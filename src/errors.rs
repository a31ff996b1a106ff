use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::{ResponseCode, ServerResponse};

/// Errors surfaced to the routing layer. Each variant that reaches a client
/// carries the message text it will see in the envelope.
#[derive(Debug, Error)]
pub enum AppError {
    /// No token in the header, query string, or form body.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Token unknown, already consumed, or expired.
    #[error("repetitive operation: {0}")]
    RepetitiveOperation(String),

    /// Store unreachable or timed out. The guarded operation did not run.
    #[error("token store unavailable: {0}")]
    StorageUnavailable(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, ResponseCode, String) {
        match self {
            AppError::IllegalArgument(msg) => (
                StatusCode::BAD_REQUEST,
                ResponseCode::IllegalArgument,
                msg.clone(),
            ),
            AppError::RepetitiveOperation(msg) => (
                StatusCode::CONFLICT,
                ResponseCode::RepetitiveOperation,
                msg.clone(),
            ),
            AppError::StorageUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ResponseCode::Error,
                msg.clone(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = self.parts();
        let body: ServerResponse = ServerResponse::error(code, msg);
        let mut response = (status, body).into_response();

        // Clients may retry once the store is back.
        if matches!(self, AppError::StorageUnavailable(_)) {
            response.headers_mut().insert(
                "retry-after",
                axum::http::HeaderValue::from_static("1"),
            );
        }

        response
    }
}
