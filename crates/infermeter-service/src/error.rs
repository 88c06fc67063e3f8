//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::dispatch::DispatchError;

/// API error type.
///
/// Every variant maps to an HTTP status and a short human-readable message;
/// internal error text is never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing, invalid, or expired credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but wrong role or inactive account.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - malformed payload.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Invalid argument - schema-level violation (e.g. non-positive amount).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Balance does not cover the price at admission time.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Conflict - duplicate email at registration.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Message broker unreachable.
    #[error("dispatch unavailable")]
    DispatchUnavailable,

    /// Timed out waiting for a queue reply.
    #[error("timed out waiting for reply")]
    Timeout,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InvalidArgument(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_argument",
                msg.clone(),
                None,
            ),
            Self::InsufficientBalance { balance, required } => (
                StatusCode::BAD_REQUEST,
                "insufficient_balance",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            // Duplicate email maps to 400 to match the public API contract.
            Self::Conflict(msg) => (StatusCode::BAD_REQUEST, "conflict", msg.clone(), None),
            Self::DispatchUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "dispatch_unavailable",
                "Messaging backend unavailable".to_string(),
                None,
            ),
            Self::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                "Timed out waiting for a result".to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<infermeter_store::StoreError> for ApiError {
    fn from(err: infermeter_store::StoreError) -> Self {
        match err {
            infermeter_store::StoreError::NotFound => Self::NotFound("Account not found".into()),
            infermeter_store::StoreError::Inactive => Self::Forbidden("Account inactive".into()),
            infermeter_store::StoreError::EmailTaken { .. } => {
                Self::Conflict("Email already registered".into())
            }
            infermeter_store::StoreError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            infermeter_store::StoreError::Overflow => {
                Self::InvalidArgument("Amount overflows the balance".into())
            }
            infermeter_store::StoreError::Database(msg)
            | infermeter_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Dispatch failed");
                Self::DispatchUnavailable
            }
            DispatchError::Timeout => Self::Timeout,
            // The job was published, so the charge stands; the caller just
            // never sees the result.
            DispatchError::ReplyLost(msg) => {
                tracing::warn!(error = %msg, "Reply channel failed after publish");
                Self::Timeout
            }
            DispatchError::Codec(msg) => Self::Internal(msg),
        }
    }
}
