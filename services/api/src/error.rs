//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use review_core::ports::PortError;
use serde::Serialize;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the review core or a port.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself was malformed (bad multipart, unreadable CSV, ...).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// JSON body returned with every error response.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicts: Option<Vec<String>>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Port(PortError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Port(PortError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Port(PortError::Forbidden(_)) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = match self {
            ApiError::Port(PortError::Conflict(names)) => ErrorBody {
                error: format!(
                    "Reviewers still hold active admin assignments: {}",
                    names.join(", ")
                ),
                conflicts: Some(names),
            },
            // Internal details stay in the logs.
            other if status.is_server_error() => ErrorBody {
                error: match other {
                    ApiError::Port(PortError::Unexpected(_)) | ApiError::Database(_) => {
                        "Failed to persist review state".to_string()
                    }
                    _ => "Internal server error".to_string(),
                },
                conflicts: None,
            },
            other => ErrorBody {
                error: match other {
                    ApiError::Port(e) => e.to_string(),
                    ApiError::BadRequest(message) => message,
                    o => o.to_string(),
                },
                conflicts: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// A convenience alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;
