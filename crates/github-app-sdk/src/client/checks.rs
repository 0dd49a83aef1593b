//! Check run operations.
//!
//! The tracker drives cost submission and bug report gates through check
//! runs attached to PR head commits. Creation is guarded by a list call so
//! redelivered webhooks do not stack duplicate runs with the same name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{read_error, InstallationClient};
use crate::error::ApiError;

/// Check run state reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunStatus {
    Queued,
    InProgress,
    Completed,
}

/// Conclusion of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunConclusion {
    ActionRequired,
    Cancelled,
    Failure,
    Neutral,
    Success,
    Skipped,
    Stale,
    TimedOut,
}

/// Output block attached to a check run response.
///
/// Both fields are null until an update supplies them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportedOutput {
    pub title: Option<String>,
    pub summary: Option<String>,
}

/// Pull request reference attached to a check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRunPullRef {
    pub number: u64,
}

/// Check suite reference attached to a check run.
///
/// Forked pull requests arrive with an empty `pull_requests` list; the suite's
/// head branch is the remaining hook for locating the pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSuiteRef {
    #[serde(default)]
    pub head_branch: Option<String>,
}

/// GitHub check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRun {
    /// Unique check run identifier
    pub id: u64,

    /// Check run name shown in the PR checks tab
    pub name: String,

    /// Commit this run is attached to
    pub head_sha: String,

    /// Current state
    pub status: CheckRunStatus,

    /// Conclusion, present once completed
    pub conclusion: Option<CheckRunConclusion>,

    /// Link rendered as "Details" in the checks tab
    pub details_url: Option<String>,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed
    pub completed_at: Option<DateTime<Utc>>,

    /// Output block
    #[serde(default)]
    pub output: ReportedOutput,

    /// Pull requests associated with the head commit
    #[serde(default)]
    pub pull_requests: Vec<CheckRunPullRef>,

    /// Owning check suite
    #[serde(default)]
    pub check_suite: Option<CheckSuiteRef>,
}

/// Output payload for check run creation and updates.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRunOutput {
    pub title: String,
    pub summary: String,
}

/// Request to create a check run.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCheckRunRequest {
    /// Check run name (required)
    pub name: String,

    /// Commit SHA to attach the run to (required)
    pub head_sha: String,

    /// Link rendered as "Details" in the checks tab
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,

    /// Initial status, defaults to queued on the GitHub side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckRunStatus>,

    /// Output block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CheckRunOutput>,
}

impl CreateCheckRunRequest {
    /// A queued check run with no output.
    pub fn queued(name: impl Into<String>, head_sha: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head_sha: head_sha.into(),
            details_url: None,
            status: None,
            output: None,
        }
    }

    /// Set the details URL.
    pub fn with_details_url(mut self, url: impl Into<String>) -> Self {
        self.details_url = Some(url.into());
        self
    }
}

/// Request to update a check run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateCheckRunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckRunStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<CheckRunConclusion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CheckRunOutput>,
}

impl UpdateCheckRunRequest {
    /// Complete the run with the given conclusion, stamped now.
    pub fn completed(conclusion: CheckRunConclusion) -> Self {
        Self {
            status: Some(CheckRunStatus::Completed),
            conclusion: Some(conclusion),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Attach an output block.
    pub fn with_output(mut self, title: impl Into<String>, summary: impl Into<String>) -> Self {
        self.output = Some(CheckRunOutput {
            title: title.into(),
            summary: summary.into(),
        });
        self
    }

    /// Set the details URL.
    pub fn with_details_url(mut self, url: impl Into<String>) -> Self {
        self.details_url = Some(url.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ListCheckRunsResponse {
    check_runs: Vec<CheckRun>,
}

impl InstallationClient {
    // ========================================================================
    // Check Run Operations
    // ========================================================================

    /// List check runs for a commit, optionally filtered by name.
    pub async fn list_check_runs_for_ref(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        check_name: Option<&str>,
    ) -> Result<Vec<CheckRun>, ApiError> {
        let mut path = format!(
            "/repos/{}/{}/commits/{}/check-runs?per_page=100",
            owner, repo, git_ref
        );
        if let Some(name) = check_name {
            let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
            path.push_str("&check_name=");
            path.push_str(&encoded);
        }

        let response = self.get(&path).await?;
        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let body: ListCheckRunsResponse = response.json().await.map_err(ApiError::from)?;
        Ok(body.check_runs)
    }

    /// Create a check run on a commit.
    pub async fn create_check_run(
        &self,
        owner: &str,
        repo: &str,
        request: CreateCheckRunRequest,
    ) -> Result<CheckRun, ApiError> {
        let path = format!("/repos/{}/{}/check-runs", owner, repo);
        let response = self.post(&path, &request).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        response.json().await.map_err(ApiError::from)
    }

    /// Update an existing check run.
    pub async fn update_check_run(
        &self,
        owner: &str,
        repo: &str,
        check_run_id: u64,
        request: UpdateCheckRunRequest,
    ) -> Result<CheckRun, ApiError> {
        let path = format!("/repos/{}/{}/check-runs/{}", owner, repo, check_run_id);
        let response = self.patch(&path, &request).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        response.json().await.map_err(ApiError::from)
    }
}

#[cfg(test)]
#[path = "checks_tests.rs"]
mod tests;
