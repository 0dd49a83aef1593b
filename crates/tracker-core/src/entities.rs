//! Persistent entity types.
//!
//! These are the document shapes stored in the `contributors`, `items`,
//! `submissions` and `bug_reports` collections. Reconciliation jobs rebuild
//! them from webhook payloads; the HTTP API reads and mutates them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::JobError;

/// Kind of trackable work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    PullRequest,
    Issue,
}

/// Access role of a contributor.
///
/// Assigned once at creation time and never rewritten by webhook-driven
/// updates; promotion is a manual store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Contributor,
    Manager,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Contributor
    }
}

/// Review state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    Pending,
    Approved,
    Rejected,
}

/// Contributor's self-reported experience working on the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Experience {
    Positive,
    Negative,
}

/// A GitHub user known to the system.
///
/// Keyed by the numeric GitHub id; the login is a mutable handle that drifts
/// as users rename themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: u64,

    pub login: String,

    /// Display name, falls back to the login when the profile has none
    pub name: String,

    /// Profile page URL
    pub url: String,

    /// Avatar image URL
    pub avatar_url: String,

    /// Defaults to `contributor` for documents written before roles existed
    #[serde(default)]
    pub role: UserRole,

    /// Hourly rate used when pricing submissions, absent until a manager
    /// sets one
    #[serde(default)]
    pub rate: Option<f64>,

    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contributor {
    /// `@login` form used in comment bodies.
    pub fn mention(&self) -> String {
        format!("@{}", self.login)
    }

    pub fn is_manager(&self) -> bool {
        self.role == UserRole::Manager
    }
}

/// A trackable unit of work, currently always a pull request.
///
/// Historical documents spell the list and timestamp fields in camelCase;
/// the aliases accept both spellings on read while writes always produce
/// the snake_case form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Provider-assigned id, unique per item
    pub id: u64,

    #[serde(rename = "type")]
    pub item_type: ItemType,

    pub org: String,

    pub repo: String,

    /// Login of the item's author
    pub owner: String,

    pub title: String,

    /// Human-facing number within the repository
    pub number: u64,

    pub url: String,

    /// Ids of every contributor who touched the item, author included
    #[serde(
        default,
        alias = "contributorIds",
        deserialize_with = "lenient_id_list"
    )]
    pub contributor_ids: Vec<u64>,

    /// Ids of submissions recorded against the item
    #[serde(default)]
    pub submission_ids: Vec<String>,

    #[serde(default)]
    pub merged: bool,

    #[serde(default, alias = "closedAt")]
    pub closed_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Record a contributor against the item, preserving insertion order.
    pub fn add_contributor(&mut self, contributor_id: u64) {
        if !self.contributor_ids.contains(&contributor_id) {
            self.contributor_ids.push(contributor_id);
        }
    }

    /// Record a submission against the item, preserving insertion order.
    pub fn add_submission(&mut self, submission_id: &str) {
        if !self.submission_ids.iter().any(|id| id == submission_id) {
            self.submission_ids.push(submission_id.to_string());
        }
    }
}

/// A contributor's claim of hours spent on an item.
///
/// At most one submission exists per `(owner_id, item_id)` pair; the store
/// enforces this with a composite unique index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Unique id assigned when the claim is recorded, referenced from
    /// `Item::submission_ids`
    pub id: String,

    /// Id of the item the hours were spent on
    pub item_id: u64,

    /// Contributor id of the claimant
    pub owner_id: u64,

    /// Hours worked, kept as the decimal string the contributor typed.
    /// Historical documents stored a bare number; both shapes read back.
    #[serde(deserialize_with = "string_or_number")]
    pub hours: String,

    pub experience: Experience,

    #[serde(default = "Approval::pending")]
    pub approval: Approval,

    /// Hourly rate copied from the contributor at creation time so later
    /// rate changes do not reprice old claims
    #[serde(default)]
    pub rate: Option<f64>,

    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Approval {
    fn pending() -> Self {
        Self::Pending
    }
}

impl Submission {
    /// Check the hours field parses as a positive decimal.
    pub fn validate(&self) -> Result<(), JobError> {
        match self.hours.parse::<f64>() {
            Ok(hours) if hours > 0.0 && hours.is_finite() => Ok(()),
            _ => Err(JobError::invalid_entity(format!(
                "hours must be a positive decimal, got {:?}",
                self.hours
            ))),
        }
    }
}

/// Links a fix pull request to the commit that introduced the bug and the
/// contributor responsible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugReport {
    /// Id of the fix pull request, unique per report
    pub item_id: u64,

    /// Link to the commit that introduced the bug
    pub commit_link: String,

    /// Login named after `bug author` in the command comment
    pub bug_author_login: String,

    /// Contributor id of the bug author, null when the named login is not
    /// a known contributor
    #[serde(default)]
    pub bug_author_id: Option<u64>,

    /// Login of the commenter who filed the report
    pub reporter_login: String,

    #[serde(default)]
    pub reporter_id: Option<u64>,

    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accept id lists from historical documents where entries may be missing,
/// null or non-numeric; anything that is not an unsigned integer is dropped.
fn lenient_id_list<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values.into_iter().filter_map(|v| v.as_u64()).collect())
}

/// Accept a string or a bare JSON number, normalized to its string form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
#[path = "entities_tests.rs"]
mod tests;
