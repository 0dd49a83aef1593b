//! Error types for document store operations.

use chrono::Duration;
use thiserror::Error;

/// Comprehensive error type for all document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("Duplicate key in {collection}: {message}")]
    DuplicateKey { collection: String, message: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Query error: {0}")]
    QueryError(#[from] QueryError),
}

impl StoreError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CollectionNotFound { .. } => false,
            Self::DuplicateKey { .. } => false,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::AuthenticationFailed { .. } => false,
            Self::ProviderError { .. } => true,
            Self::SerializationError(_) => false,
            Self::ConfigurationError(_) => false,
            Self::QueryError(_) => false,
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Timeout { .. } => Some(Duration::seconds(1)),
            Self::ConnectionFailed { .. } => Some(Duration::seconds(5)),
            Self::ProviderError { .. } => Some(Duration::seconds(1)),
            _ => None,
        }
    }
}

/// Errors during document serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Document is not a JSON object: {message}")]
    InvalidDocument { message: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Unsupported provider {provider}: {message}")]
    UnsupportedProvider { provider: String, message: String },
}

/// Query parsing errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
