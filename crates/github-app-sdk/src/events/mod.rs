//! GitHub webhook event types and parsing.
//!
//! A webhook delivery carries its event family in the `X-GitHub-Event`
//! header and the payload as JSON in the body. [`WebhookEvent::parse`] pairs
//! the two into a typed event. Families the tracker takes no action on
//! decode to [`WebhookEvent::Unsupported`] so callers can acknowledge and
//! drop them without special-casing; only a payload that fails to match its
//! declared family is an error.

use serde::de::DeserializeOwned;

use crate::error::EventError;

pub mod github_events;

pub use github_events::*;

/// A webhook delivery decoded against its `X-GitHub-Event` header.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// `pull_request` deliveries
    PullRequest(PullRequestEvent),

    /// `pull_request_review` deliveries
    PullRequestReview(PullRequestReviewEvent),

    /// `issues` deliveries
    Issues(IssueEvent),

    /// `issue_comment` deliveries
    IssueComment(IssueCommentEvent),

    /// `check_run` deliveries
    CheckRun(CheckRunEvent),

    /// Event families with no handler here, `ping` and `installation`
    /// lifecycle notices included
    Unsupported {
        /// Event name as delivered in the header
        event: String,
    },
}

impl WebhookEvent {
    /// Decode a raw delivery body using the event name from the
    /// `X-GitHub-Event` header.
    pub fn parse(event: &str, payload: &[u8]) -> Result<Self, EventError> {
        let parsed = match event {
            "pull_request" => Self::PullRequest(decode(event, payload)?),
            "pull_request_review" => Self::PullRequestReview(decode(event, payload)?),
            "issues" => Self::Issues(decode(event, payload)?),
            "issue_comment" => Self::IssueComment(decode(event, payload)?),
            "check_run" => Self::CheckRun(decode(event, payload)?),
            other => Self::Unsupported {
                event: other.to_string(),
            },
        };

        Ok(parsed)
    }

    /// Event name as it appeared in the `X-GitHub-Event` header.
    pub fn event_name(&self) -> &str {
        match self {
            Self::PullRequest(_) => "pull_request",
            Self::PullRequestReview(_) => "pull_request_review",
            Self::Issues(_) => "issues",
            Self::IssueComment(_) => "issue_comment",
            Self::CheckRun(_) => "check_run",
            Self::Unsupported { event } => event,
        }
    }
}

fn decode<T: DeserializeOwned>(event: &str, payload: &[u8]) -> Result<T, EventError> {
    serde_json::from_slice(payload).map_err(|source| EventError::MalformedPayload {
        event: event.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
