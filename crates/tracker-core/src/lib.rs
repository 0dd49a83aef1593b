//! # Tracker Core
//!
//! Business logic of the PR time tracker GitHub App: webhook-driven jobs
//! keep the contributor, item, submission and bug report collections in
//! step with pull request activity, and maintain the sticky comments,
//! check runs and analytics rows that activity produces.
//!
//! This library provides:
//! - Idempotent reconciliation jobs, one per webhook family
//! - Store-backed repositories over the tracker collections
//! - Deterministic analytics rows whose identities survive redelivery
//! - The sticky comment and check run grammar shared across jobs
//! - Application configuration loading and validation
//!
//! ## Architecture
//!
//! Jobs are the only writers of tracked state. The HTTP layer decodes and
//! acknowledges webhook deliveries, then hands the typed event to
//! [`jobs::dispatch`]; everything after the acknowledgement re-reads
//! current state, so deliveries can arrive duplicated, unordered or racing
//! each other and still converge on the same documents, comments and
//! check run conclusions.

// ============================================================================
// Module declarations
// ============================================================================

/// Analytics fact rows and their sinks
pub mod analytics;

/// Sticky comment markers, bodies and mention-list grammar
pub mod comments;

/// Application configuration loading and validation
pub mod config;

/// Stored document shapes for the tracker collections
pub mod entities;

/// Job-level error type
pub mod error;

/// Webhook-driven reconciliation jobs
pub mod jobs;

/// Payload-to-document normalization rules
pub mod normalize;

/// Typed repositories over the document store
pub mod repositories;

/// Check run re-evaluation handoff between service instances
pub mod trigger;

// Re-export key types for convenience
pub use analytics::{AnalyticsAction, AnalyticsEvent, AnalyticsSink, HttpSink, MemorySink};
pub use config::{ConfigError, TrackerConfig};
pub use entities::{
    Approval, BugReport, Contributor, Experience, Item, ItemType, Submission, UserRole,
};
pub use error::JobError;
pub use jobs::{dispatch, JobContext, JobSettings};
pub use repositories::Repositories;
pub use trigger::{CheckRunKind, CheckRunTrigger, TriggerClient};
