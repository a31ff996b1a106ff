//! Shared response envelope: `{status, msg, data}`.
//!
//! `status == 0` is success; every other value is an error code. HTTP status
//! codes are set separately by [`crate::errors::AppError`].

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    Error,
    IllegalArgument,
    RepetitiveOperation,
}

impl ResponseCode {
    pub fn code(self) -> i32 {
        match self {
            ResponseCode::Success => 0,
            ResponseCode::Error => 1,
            ResponseCode::IllegalArgument => 2,
            ResponseCode::RepetitiveOperation => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerResponse<T = serde_json::Value> {
    pub status: i32,
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ServerResponse<T> {
    pub fn new(code: ResponseCode, msg: Option<String>, data: Option<T>) -> Self {
        Self {
            status: code.code(),
            msg,
            data,
        }
    }

    pub fn success() -> Self {
        Self::new(ResponseCode::Success, None, None)
    }

    pub fn success_msg(msg: impl Into<String>) -> Self {
        Self::new(ResponseCode::Success, Some(msg.into()), None)
    }

    pub fn success_data(data: T) -> Self {
        Self::new(ResponseCode::Success, None, Some(data))
    }

    pub fn error(code: ResponseCode, msg: impl Into<String>) -> Self {
        Self::new(code, Some(msg.into()), None)
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseCode::Success.code()
    }
}

impl<T: Serialize> IntoResponse for ServerResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
