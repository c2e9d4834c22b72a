//! HTTP Error Handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const UNAUTHORIZED: i32 = 401;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const CANCELLED: i32 = 499;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const UPSTREAM_ERROR: i32 = 502;
    pub const TIMEOUT: i32 = 504;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Cancelled(String),
    Internal(String),
    Upstream(String),
    Timeout(String),
}

impl ApiError {
    pub fn errno(&self) -> i32 {
        match self {
            ApiError::BadRequest(_) => errno::BAD_REQUEST,
            ApiError::Unauthorized(_) => errno::UNAUTHORIZED,
            ApiError::NotFound(_) => errno::NOT_FOUND,
            ApiError::Conflict(_) => errno::CONFLICT,
            ApiError::Cancelled(_) => errno::CANCELLED,
            ApiError::Internal(_) => errno::INTERNAL_ERROR,
            ApiError::Upstream(_) => errno::UPSTREAM_ERROR,
            ApiError::Timeout(_) => errno::TIMEOUT,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Cancelled(msg)
            | ApiError::Internal(msg)
            | ApiError::Upstream(msg)
            | ApiError::Timeout(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.errno();
        let msg = self.message();

        match &self {
            ApiError::Internal(_) | ApiError::Upstream(_) => {
                tracing::error!(errno = code, error = %msg, "Request failed")
            }
            ApiError::Cancelled(_) => tracing::info!(errno = code, error = %msg, "Request cancelled"),
            _ => tracing::warn!(errno = code, error = %msg, "Request rejected"),
        }

        (StatusCode::OK, Json(ErrorResponse::new(code, msg))).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        let msg = e.to_string();
        match e {
            ApplicationError::ValidationError(_) => ApiError::BadRequest(msg),
            ApplicationError::ProtectionError(_) => ApiError::Unauthorized(msg),
            ApplicationError::SubmissionDegraded { .. } => ApiError::Upstream(msg),
            ApplicationError::PollTimeout { .. } => ApiError::Timeout(msg),
            ApplicationError::PollFailed { .. } => ApiError::Upstream(msg),
            ApplicationError::Cancelled(_) => ApiError::Cancelled(msg),
            ApplicationError::NotFound { .. } => ApiError::NotFound(msg),
            ApplicationError::InvalidState(_) => ApiError::Conflict(msg),
            ApplicationError::InternalError(_) => ApiError::Internal(msg),
        }
    }
}
