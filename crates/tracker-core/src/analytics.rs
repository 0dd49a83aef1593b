//! Analytics event construction and ingestion.
//!
//! Every interesting state transition produces an append-only fact row.
//! Webhooks are redelivered, so each row carries a deterministic id derived
//! from the transition it describes; sinks treat a repeated id as already
//! inserted. Rows are write-once and never mutated by this system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

use crate::error::JobError;

/// Kind of state transition an analytics row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsAction {
    PrOpened,
    PrMerged,
    PrClosed,
    /// Reviewer's perspective on an approving review
    PrReviewApprove,
    /// PR owner's perspective on the same review
    PrApproved,
    PrSubmissionCreated,
    PrSubmissionApproved,
    BugIntroduced,
}

impl AnalyticsAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrOpened => "pr_opened",
            Self::PrMerged => "pr_merged",
            Self::PrClosed => "pr_closed",
            Self::PrReviewApprove => "pr_review_approve",
            Self::PrApproved => "pr_approved",
            Self::PrSubmissionCreated => "pr_submission_created",
            Self::PrSubmissionApproved => "pr_submission_approved",
            Self::BugIntroduced => "bug_introduced",
        }
    }
}

impl fmt::Display for AnalyticsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable fact row.
///
/// `dedup_id` is the deterministic identity; the sink keys idempotent
/// insertion on it. `event_id` is the numeric id of the item the row is
/// about. Timestamps are unix seconds rendered as strings, matching the
/// analytical sink's column types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    #[serde(rename = "_id")]
    pub dedup_id: String,

    #[serde(rename = "id")]
    pub event_id: u64,

    pub organization: String,

    pub repository: String,

    pub action: AnalyticsAction,

    pub title: String,

    /// Login of the item's author
    pub owner: String,

    /// Login of the account whose activity produced the row
    pub sender: String,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub payload: Option<String>,

    pub index: i32,

    pub created_at: String,

    pub updated_at: String,
}

impl AnalyticsEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dedup_id: String,
        action: AnalyticsAction,
        event_id: u64,
        organization: &str,
        repository: &str,
        title: &str,
        owner: &str,
        sender: &str,
    ) -> Self {
        let now = now_unix_seconds();
        Self {
            dedup_id,
            event_id,
            organization: organization.to_string(),
            repository: repository.to_string(),
            action,
            title: title.to_string(),
            owner: owner.to_string(),
            sender: sender.to_string(),
            label: None,
            payload: None,
            index: 1,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Replace the row timestamps with payload-derived ones, so redelivered
    /// webhooks reproduce the original row byte for byte.
    pub fn with_timestamps(
        mut self,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        self.created_at = created_at.into();
        self.updated_at = updated_at.into();
        self
    }
}

// ============================================================================
// Deterministic row identities
// ============================================================================

/// Identity for once-per-item lifecycle transitions (opened, merged, closed).
pub fn lifecycle_event_id(
    org: &str,
    repo: &str,
    item_id: u64,
    action: AnalyticsAction,
) -> String {
    format!("{org}/{repo}@{item_id}_{action}")
}

/// Identity for transitions that can happen once per actor and moment, such
/// as reviews; the sender and timestamp salt keeps distinct reviews distinct
/// while redeliveries of the same review collapse.
pub fn actor_event_id(
    org: &str,
    repo: &str,
    item_id: u64,
    sender: &str,
    timestamp: &str,
    action: AnalyticsAction,
) -> String {
    format!("{org}/{repo}@{item_id}_{sender}_{timestamp}_{action}")
}

/// Identity for the bug-introduced row of a fix pull request.
pub fn bug_report_event_id(
    org: &str,
    repo: &str,
    item_id: u64,
    action: AnalyticsAction,
) -> String {
    format!("{org}/{repo}@{item_id}_{action}_bug-report")
}

/// Identity for submission transitions, salted with the claimant and the
/// submission's creation time.
pub fn submission_event_id(
    item_id: u64,
    login: &str,
    created_at: &str,
    action: AnalyticsAction,
) -> String {
    format!("{item_id}_{login}_{created_at}_{action}")
}

/// Unix seconds as a string.
pub fn unix_seconds(timestamp: DateTime<Utc>) -> String {
    timestamp.timestamp().to_string()
}

pub fn now_unix_seconds() -> String {
    unix_seconds(Utc::now())
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for analytics rows.
///
/// Implementations must be idempotent under `dedup_id`: inserting a row
/// whose id already exists is a silent no-op, never an error and never a
/// second row.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn insert(&self, event: &AnalyticsEvent) -> Result<(), JobError>;
}

/// In-process sink holding rows in memory, used by tests and as the default
/// when no ingest endpoint is configured.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row in insertion order.
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Actions of every stored row in insertion order.
    pub fn actions(&self) -> Vec<AnalyticsAction> {
        self.events().into_iter().map(|row| row.action).collect()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn insert(&self, event: &AnalyticsEvent) -> Result<(), JobError> {
        let mut rows = self.events.lock().map_err(|_| JobError::Analytics {
            message: "memory sink lock poisoned".to_string(),
        })?;
        if rows.iter().any(|row| row.dedup_id == event.dedup_id) {
            return Ok(());
        }
        rows.push(event.clone());
        Ok(())
    }
}

/// Sink that forwards rows to an HTTP ingest endpoint.
///
/// The endpoint performs the merge-by-id, so a duplicate id answered with a
/// success status is still a clean insert from this side.
pub struct HttpSink {
    client: reqwest::Client,
    ingest_url: String,
    secret: String,
}

impl HttpSink {
    pub fn new(
        client: reqwest::Client,
        ingest_url: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            ingest_url: ingest_url.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl AnalyticsSink for HttpSink {
    async fn insert(&self, event: &AnalyticsEvent) -> Result<(), JobError> {
        let response = self
            .client
            .post(&self.ingest_url)
            .header("x-analytics-secret", &self.secret)
            .json(event)
            .send()
            .await
            .map_err(|e| JobError::Analytics {
                message: format!("ingest request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(JobError::Analytics {
                message: format!("ingest endpoint answered {}", response.status()),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSink")
            .field("ingest_url", &self.ingest_url)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "analytics_tests.rs"]
mod tests;
