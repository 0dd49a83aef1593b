//! Error types for reconciliation work.
//!
//! Jobs tell persistence failures apart from GitHub side effects: the store
//! is the source of truth, so store errors abort a job and surface to the
//! caller for retry, while comment and check run failures are logged at the
//! call site and the job carries on.

use doc_store::StoreError;
use github_app_sdk::error::{ApiError, AuthError};
use thiserror::Error;

/// Errors raised while reconciling webhook events into the document store.
#[derive(Debug, Error)]
pub enum JobError {
    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// GitHub API call failed.
    #[error("GitHub API error: {0}")]
    GitHub(#[from] ApiError),

    /// GitHub App authentication failed.
    #[error("GitHub auth error: {0}")]
    Auth(#[from] AuthError),

    /// An update matched no document and could not fall back to a create.
    #[error("Update failed in {collection}: no document matched {key}")]
    UpdateFailed { collection: String, key: String },

    /// A payload or stored document was missing data the job cannot proceed
    /// without.
    #[error("Invalid entity: {message}")]
    InvalidEntity { message: String },

    /// Analytics ingestion failed.
    #[error("Analytics ingestion failed: {message}")]
    Analytics { message: String },

    /// Check-run re-evaluation handoff failed.
    #[error("Trigger handoff failed: {message}")]
    Trigger { message: String },
}

impl JobError {
    /// Check if error is transient and the job is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            Self::GitHub(err) => err.is_transient(),
            Self::Auth(err) => err.is_transient(),
            Self::UpdateFailed { .. } => false,
            Self::InvalidEntity { .. } => false,
            Self::Analytics { .. } => true,
            Self::Trigger { .. } => true,
        }
    }

    pub fn invalid_entity(message: impl Into<String>) -> Self {
        Self::InvalidEntity {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
