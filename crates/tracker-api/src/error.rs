//! Error types for the HTTP surface.
//!
//! REST handlers answer failures with the same `{message, error}` envelope
//! the success path mirrors with `{message, data}`. Status selection leans
//! on the job layer's transience classification: retryable failures say so
//! with 503 and a Retry-After header, everything else is either a caller
//! mistake (4xx) or a server fault (500).

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{error, warn};

use tracker_core::{ConfigError, JobError};

// ============================================================================
// Request errors
// ============================================================================

/// Errors a REST handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The caller could not be identified as a known contributor.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The caller is known but not allowed to perform this operation.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// The request body or parameters failed validation.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The write collides with a document that already exists.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The underlying store, GitHub or analytics operation failed.
    #[error(transparent)]
    Job(#[from] JobError),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            // Bad data in a request surfaces from repositories as an
            // invalid-entity failure; the caller sent it, so it is theirs.
            Self::Job(JobError::InvalidEntity { .. }) => StatusCode::BAD_REQUEST,
            Self::Job(error) if error.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = json!({
            "message": self.to_string(),
            "error": true,
        });

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from_static("60"));
        }
        response
    }
}

// ============================================================================
// Service errors
// ============================================================================

/// Service-level errors, mapped to process exit codes by the binary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Failed to bind to the configured address.
    #[error("Failed to bind to {address}: {message}")]
    BindFailed { address: String, message: String },

    /// The server stopped with an error.
    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The startup health probe against the document store failed.
    #[error("Health check failed: {message}")]
    HealthCheckFailed { message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
