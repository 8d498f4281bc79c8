//! API error types and response handling.
//!
//! Handlers return [`ApiError`], which renders as a JSON [`ErrorResponse`]
//! with the status and machine code of the underlying registry error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use devreg_core::RegistryError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - invalid input from the client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - the resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - existing data or dependent records block the change.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "SERIAL_RANGE_CONFLICT",
    "message": "Serial number already exists",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "SERIAL_RANGE_CONFLICT")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Serial number already exists")]
    pub message: String,

    /// Optional additional details.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// A 400 with the given code and message.
    pub fn bad_request(error_code: &str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (Self::BadRequest {
            error_code,
            message,
        }
        | Self::NotFound {
            error_code,
            message,
        }
        | Self::Conflict {
            error_code,
            message,
        }
        | Self::InternalError {
            error_code,
            message,
        }) = self;

        if status.is_server_error() {
            tracing::error!(error_code = %error_code, message = %message, "Internal server error");
        }

        let body = ErrorResponse {
            error: error_code,
            message,
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        if let Some(source) = std::error::Error::source(&err) {
            tracing::error!(error_code = err.error_code(), source = %source, "registry failure");
        }
        let error_code = err.error_code().to_string();
        let message = err.to_string();
        match err.http_status_code() {
            400 => Self::BadRequest {
                error_code,
                message,
            },
            404 => Self::NotFound {
                error_code,
                message,
            },
            409 => Self::Conflict {
                error_code,
                message,
            },
            _ => Self::InternalError {
                error_code,
                message,
            },
        }
    }
}
