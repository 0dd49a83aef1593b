//! GitHub-specific event structures and types.
//!
//! This module defines typed structures for the webhook event families the
//! tracker consumes: pull requests, pull request reviews, issues, issue
//! comments, and check runs. Resource payloads reuse the client module's
//! types where the webhook delivers the same shape the REST API returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::InstallationId;
use crate::client::{Actor, CheckRun, Comment, PullRequest};

// ============================================================================
// Pull Request Events
// ============================================================================

/// Pull request event with action and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestEvent {
    /// Action that triggered this event
    pub action: PullRequestAction,

    /// Pull request number
    pub number: u64,

    /// Pull request details
    pub pull_request: PullRequest,

    /// Previous field values, present on `edited`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<PullRequestChanges>,

    /// Reviewer this delivery is about, present on `review_requested` and
    /// `review_request_removed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_reviewer: Option<Actor>,

    /// Repository information
    pub repository: EventRepository,

    /// Organization information, absent for user-owned repositories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<EventOrganization>,

    /// App installation scoping this delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<EventInstallation>,

    /// User who triggered the event
    pub sender: Actor,
}

/// Actions that can occur on pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    Edited,
    Closed,
    Reopened,
    Synchronize,
    ReadyForReview,
    ConvertedToDraft,
    ReviewRequested,
    ReviewRequestRemoved,
    Assigned,
    Unassigned,
    Labeled,
    Unlabeled,
    /// Action names this enum does not list deserialize here rather than
    /// failing the whole delivery.
    #[serde(other)]
    Other,
}

impl fmt::Display for PullRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opened => "opened",
            Self::Edited => "edited",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
            Self::Synchronize => "synchronize",
            Self::ReadyForReview => "ready_for_review",
            Self::ConvertedToDraft => "converted_to_draft",
            Self::ReviewRequested => "review_requested",
            Self::ReviewRequestRemoved => "review_request_removed",
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
            Self::Labeled => "labeled",
            Self::Unlabeled => "unlabeled",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Previous values attached to a pull request `edited` delivery.
///
/// GitHub only includes the fields that actually changed, so a retitle
/// carries `title` while a description edit does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestChanges {
    /// Previous title, present when the title changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<ChangedFrom>,

    /// Previous body, present when the body changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ChangedFrom>,
}

// ============================================================================
// Issue Events
// ============================================================================

/// Issue event with action and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueEvent {
    /// Action that triggered this event
    pub action: IssueAction,

    /// Issue details
    pub issue: EventIssue,

    /// Repository information
    pub repository: EventRepository,

    /// Organization information, absent for user-owned repositories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<EventOrganization>,

    /// App installation scoping this delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<EventInstallation>,

    /// User who triggered the event
    pub sender: Actor,
}

/// Actions that can occur on issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueAction {
    Opened,
    Edited,
    Closed,
    Reopened,
    Transferred,
    Pinned,
    Unpinned,
    Assigned,
    Unassigned,
    Labeled,
    Unlabeled,
    #[serde(other)]
    Other,
}

impl fmt::Display for IssueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opened => "opened",
            Self::Edited => "edited",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
            Self::Transferred => "transferred",
            Self::Pinned => "pinned",
            Self::Unpinned => "unpinned",
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
            Self::Labeled => "labeled",
            Self::Unlabeled => "unlabeled",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Issue details from an event payload.
///
/// Comment deliveries use this shape for pull requests as well; the
/// `pull_request` key marks those.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIssue {
    /// Unique issue identifier
    pub id: u64,

    /// Issue number (repository-specific)
    pub number: u64,

    /// Issue title
    pub title: String,

    /// Issue body content (Markdown)
    pub body: Option<String>,

    /// Issue state, "open" or "closed"
    pub state: String,

    /// User who created the issue
    pub user: Actor,

    /// Present when this "issue" is the issue facet of a pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<IssuePullRequestRef>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Web URL for the issue
    pub html_url: String,
}

impl EventIssue {
    /// Whether this issue is the issue facet of a pull request.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Marker linking an issue payload to the pull request it fronts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuePullRequestRef {
    /// API URL of the pull request
    pub url: String,
}

// ============================================================================
// Issue Comment Events
// ============================================================================

/// Issue comment event with action and details.
///
/// Fires for comments on both issues and pull requests; check
/// [`EventIssue::is_pull_request`] to tell them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCommentEvent {
    /// Action that triggered this event
    pub action: IssueCommentAction,

    /// Issue (or pull request facet) the comment belongs to
    pub issue: EventIssue,

    /// Comment details
    pub comment: Comment,

    /// Previous field values, present on `edited`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<CommentChanges>,

    /// Repository information
    pub repository: EventRepository,

    /// Organization information, absent for user-owned repositories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<EventOrganization>,

    /// App installation scoping this delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<EventInstallation>,

    /// User who triggered the event
    pub sender: Actor,
}

/// Actions that can occur on issue comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCommentAction {
    Created,
    Edited,
    Deleted,
}

impl fmt::Display for IssueCommentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Edited => "edited",
            Self::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// Previous values attached to a comment `edited` delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentChanges {
    /// Previous body, present when the body changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ChangedFrom>,
}

// ============================================================================
// Pull Request Review Events
// ============================================================================

/// Pull request review event with action and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestReviewEvent {
    /// Action that triggered this event
    pub action: PullRequestReviewAction,

    /// Review details
    pub review: Review,

    /// Pull request the review belongs to
    pub pull_request: PullRequest,

    /// Repository information
    pub repository: EventRepository,

    /// Organization information, absent for user-owned repositories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<EventOrganization>,

    /// App installation scoping this delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<EventInstallation>,

    /// User who triggered the event
    pub sender: Actor,
}

/// Actions that can occur on pull request reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestReviewAction {
    Submitted,
    Edited,
    Dismissed,
}

impl fmt::Display for PullRequestReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Edited => "edited",
            Self::Dismissed => "dismissed",
        };
        write!(f, "{}", s)
    }
}

/// Review details from a pull request review event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Unique review identifier
    pub id: u64,

    /// User who wrote the review
    pub user: Actor,

    /// Review body content (Markdown)
    pub body: Option<String>,

    /// Review verdict
    pub state: ReviewState,

    /// When the review was submitted
    pub submitted_at: Option<DateTime<Utc>>,

    /// Web URL for the review
    pub html_url: String,
}

impl Review {
    /// Whether this review approves the pull request.
    pub fn is_approval(&self) -> bool {
        self.state == ReviewState::Approved
    }
}

/// Verdict a review carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    #[serde(other)]
    Other,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Approved => "approved",
            Self::ChangesRequested => "changes_requested",
            Self::Commented => "commented",
            Self::Dismissed => "dismissed",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Check Run Events
// ============================================================================

/// Check run event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRunEvent {
    /// Action that triggered this event
    pub action: CheckRunAction,

    /// Check run details
    pub check_run: CheckRun,

    /// Repository information
    pub repository: EventRepository,

    /// Organization information, absent for user-owned repositories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<EventOrganization>,

    /// App installation scoping this delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<EventInstallation>,

    /// User who triggered the event
    pub sender: Actor,
}

/// Actions that can occur on check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunAction {
    Created,
    Completed,
    Rerequested,
    RequestedAction,
}

impl fmt::Display for CheckRunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Completed => "completed",
            Self::Rerequested => "rerequested",
            Self::RequestedAction => "requested_action",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Shared Types
// ============================================================================

/// Repository information in event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRepository {
    /// Repository ID
    pub id: u64,

    /// Repository name
    pub name: String,

    /// Full repository name ("owner/repo")
    pub full_name: String,

    /// Repository owner
    pub owner: Actor,

    /// Whether the repository is private
    #[serde(default)]
    pub private: bool,

    /// Web URL for the repository
    pub html_url: String,
}

/// Organization information in event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOrganization {
    /// Organization ID
    pub id: u64,

    /// Organization login
    pub login: String,
}

/// App installation reference in event payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventInstallation {
    /// Installation ID
    pub id: InstallationId,
}

/// Previous value of a single edited field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFrom {
    /// Value before the edit
    pub from: String,
}

#[cfg(test)]
#[path = "github_events_tests.rs"]
mod tests;
