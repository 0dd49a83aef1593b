//! Error types for GitHub App authentication and API access.
//!
//! Errors are grouped by concern: authentication (`AuthError`), secret
//! resolution (`SecretError`), token caching (`CacheError`), API calls
//! (`ApiError`), and input validation (`ValidationError`). Transient
//! failures can be detected through `is_transient()` so callers can decide
//! whether a retry is worthwhile.

use thiserror::Error;

/// Errors that occur during GitHub App authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The App credentials were rejected by GitHub.
    #[error("Invalid GitHub App credentials")]
    InvalidCredentials,

    /// No installation was found for the requested target.
    #[error("Installation not found: {target}")]
    InstallationNotFound {
        /// Organization login or installation id that failed to resolve
        target: String,
    },

    /// A token was used past its expiration time.
    #[error("Token expired")]
    TokenExpired,

    /// The installation token does not grant the required permission.
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Permission that was required for the operation
        required: String,
    },

    /// The configured private key could not be parsed.
    #[error("Invalid private key: {message}")]
    InvalidPrivateKey { message: String },

    /// JWT creation failed.
    #[error("JWT generation failed: {message}")]
    JwtGenerationFailed { message: String },

    /// Secret resolution failed.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// Token cache access failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An underlying API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    /// Whether the failure is transient and a retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::InvalidCredentials => false,
            AuthError::InstallationNotFound { .. } => false,
            AuthError::TokenExpired => true,
            AuthError::InsufficientPermissions { .. } => false,
            AuthError::InvalidPrivateKey { .. } => false,
            AuthError::JwtGenerationFailed { .. } => false,
            AuthError::Secret(_) => false,
            AuthError::Cache(_) => true,
            AuthError::Api(err) => err.is_transient(),
        }
    }
}

/// Errors that occur while resolving secrets.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The requested secret does not exist.
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// The secret store rejected the request.
    #[error("Secret access failed: {message}")]
    AccessFailed { message: String },

    /// The secret exists but is not in the expected format.
    #[error("Secret has invalid format: {message}")]
    InvalidFormat { message: String },
}

/// Errors that occur while reading or writing the token cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache operation could not be completed.
    #[error("Cache operation failed: {message}")]
    OperationFailed { message: String },
}

/// Errors returned by the GitHub REST and GraphQL APIs.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API returned a non-success status not covered by a more
    /// specific variant.
    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    /// The API rate limit was exhausted.
    #[error("Rate limited until {reset_at}")]
    RateLimited {
        reset_at: chrono::DateTime<chrono::Utc>,
    },

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The request was well-formed but semantically invalid (HTTP 422).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A usable token could not be obtained before the request was sent.
    #[error("Token generation failed: {message}")]
    TokenGenerationFailed { message: String },

    /// The credentials were missing or rejected (HTTP 401).
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The credentials lack access to the resource (HTTP 403).
    #[error("Authorization failed")]
    AuthorizationFailed,

    /// The resource does not exist (HTTP 404).
    #[error("Resource not found")]
    NotFound,

    /// Response body could not be deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Map a non-success HTTP status to the matching error variant.
    ///
    /// `message` is the response body, kept for diagnostics.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            422 => ApiError::InvalidRequest { message },
            404 => ApiError::NotFound,
            // Retry-After is not always present; assume a minute
            429 => ApiError::RateLimited {
                reset_at: chrono::Utc::now() + chrono::Duration::seconds(60),
            },
            403 => ApiError::AuthorizationFailed,
            401 => ApiError::AuthenticationFailed,
            _ => ApiError::HttpError { status, message },
        }
    }

    /// Whether the failure is transient and a retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::HttpError { status, .. } => *status >= 500,
            ApiError::RateLimited { .. } => true,
            ApiError::Timeout => true,
            ApiError::InvalidRequest { .. } => false,
            ApiError::TokenGenerationFailed { .. } => false,
            ApiError::AuthenticationFailed => false,
            ApiError::AuthorizationFailed => false,
            ApiError::NotFound => false,
            ApiError::Json(_) => false,
            ApiError::Http(err) => err.is_timeout() || err.is_connect(),
        }
    }
}

/// Errors raised while validating inputs, including webhook signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field was missing.
    #[error("Required field missing: {field}")]
    Required { field: String },

    /// A field was present but malformed.
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    /// A numeric field was outside its allowed range.
    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },

    /// A webhook signature header was malformed.
    #[error("Invalid signature format: {message}")]
    InvalidSignatureFormat { message: String },

    /// HMAC computation failed.
    #[error("HMAC error: {message}")]
    HmacError { message: String },
}

/// Errors raised while decoding webhook event payloads.
#[derive(Debug, Error)]
pub enum EventError {
    /// The payload did not match the structure its event name promises.
    #[error("Malformed {event} payload: {source}")]
    MalformedPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
