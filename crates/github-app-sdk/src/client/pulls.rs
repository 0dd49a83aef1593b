//! Pull request lookups.
//!
//! Webhook payloads identify PRs three different ways depending on the
//! event: by number, by GraphQL node ID, or only by head branch. All three
//! resolve to the same REST representation here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{read_error, Actor, InstallationClient};
use crate::error::ApiError;

/// GitHub pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// Unique pull request identifier
    pub id: u64,

    /// Node ID for GraphQL API
    pub node_id: String,

    /// Pull request number (repository-specific)
    pub number: u64,

    /// Pull request title
    pub title: String,

    /// Pull request body content (Markdown)
    pub body: Option<String>,

    /// Pull request state, "open" or "closed"
    pub state: String,

    /// User who created the pull request
    pub user: Actor,

    /// Head branch information
    pub head: PullRequestBranch,

    /// Base branch information
    pub base: PullRequestBranch,

    /// Whether the pull request is a draft
    #[serde(default)]
    pub draft: bool,

    /// Reviewers whose review is currently requested
    #[serde(default)]
    pub requested_reviewers: Vec<Actor>,

    /// Teams whose review is currently requested
    #[serde(default)]
    pub requested_teams: Vec<TeamRef>,

    /// Whether the pull request is merged.
    ///
    /// Only the single-PR endpoint reports this; list responses omit it,
    /// so prefer `is_merged`.
    #[serde(default)]
    pub merged: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Close timestamp
    pub closed_at: Option<DateTime<Utc>>,

    /// Merge timestamp
    pub merged_at: Option<DateTime<Utc>>,

    /// Pull request URL
    pub html_url: String,
}

impl PullRequest {
    /// Whether the PR has been merged, regardless of which endpoint
    /// produced this value.
    pub fn is_merged(&self) -> bool {
        self.merged || self.merged_at.is_some()
    }

    /// Whether any reviewer or team review request is outstanding.
    pub fn has_requested_reviewers(&self) -> bool {
        !self.requested_reviewers.is_empty() || !self.requested_teams.is_empty()
    }
}

/// Team reference in review request lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: u64,

    #[serde(default)]
    pub slug: Option<String>,
}

/// Branch information in a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestBranch {
    /// Branch name
    #[serde(rename = "ref")]
    pub branch_ref: String,

    /// Commit SHA
    pub sha: String,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: NodeVariables<'a>,
}

#[derive(Serialize)]
struct NodeVariables<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<NodeData>,
}

#[derive(Deserialize)]
struct NodeData {
    node: Option<NodeNumber>,
}

#[derive(Deserialize)]
struct NodeNumber {
    number: Option<u64>,
}

const PR_NUMBER_BY_NODE_QUERY: &str =
    "query ($id: ID!) { node(id: $id) { ... on PullRequest { number } } }";

impl InstallationClient {
    // ========================================================================
    // Pull Request Operations
    // ========================================================================

    /// Get a pull request by number.
    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, ApiError> {
        let path = format!("/repos/{}/{}/pulls/{}", owner, repo, number);
        let response = self.get(&path).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        response.json().await.map_err(ApiError::from)
    }

    /// Resolve a GraphQL node ID to a pull request.
    ///
    /// Returns `None` when the node does not exist or is not a PR.
    pub async fn find_pull_request_by_node_id(
        &self,
        owner: &str,
        repo: &str,
        node_id: &str,
    ) -> Result<Option<PullRequest>, ApiError> {
        let request = GraphQlRequest {
            query: PR_NUMBER_BY_NODE_QUERY,
            variables: NodeVariables { id: node_id },
        };
        let response = self.post("/graphql", &request).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let body: GraphQlResponse = response.json().await.map_err(ApiError::from)?;
        let number = body
            .data
            .and_then(|d| d.node)
            .and_then(|n| n.number);

        match number {
            Some(number) => Ok(Some(self.get_pull_request(owner, repo, number).await?)),
            None => Ok(None),
        }
    }

    /// Find the most recent pull request whose head is the given branch.
    pub async fn find_pull_request_by_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<PullRequest>, ApiError> {
        let encoded: String =
            url::form_urlencoded::byte_serialize(format!("{}:{}", owner, branch).as_bytes())
                .collect();
        let path = format!(
            "/repos/{}/{}/pulls?head={}&state=all&per_page=1",
            owner, repo, encoded
        );
        let response = self.get(&path).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let mut pulls: Vec<PullRequest> = response.json().await.map_err(ApiError::from)?;
        if pulls.is_empty() {
            Ok(None)
        } else {
            Ok(Some(pulls.remove(0)))
        }
    }

    /// Resolve the pull request behind an issue number, if there is one.
    ///
    /// Issue and PR numbers share one sequence; comment events on a PR
    /// arrive as issue events.
    pub async fn pull_request_for_issue(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Option<PullRequest>, ApiError> {
        match self.get_pull_request(owner, repo, issue_number).await {
            Ok(pull) => Ok(Some(pull)),
            Err(ApiError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[path = "pulls_tests.rs"]
mod tests;
