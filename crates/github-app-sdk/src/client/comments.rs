//! Issue and PR comment operations.
//!
//! Comments carry the tracker's sticky notices: an invisible HTML marker in
//! the body identifies a notice so later deliveries can find and replace it
//! instead of stacking duplicates. PRs are issues for the comments API, so
//! one set of operations serves both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{parse_link_header, read_error, Actor, InstallationClient};
use crate::error::ApiError;

/// Comment on an issue or pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Unique comment identifier
    pub id: u64,

    /// Node ID for GraphQL API
    pub node_id: String,

    /// Comment body content (Markdown)
    pub body: Option<String>,

    /// User who created the comment
    pub user: Actor,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Comment URL
    pub html_url: String,
}

impl Comment {
    /// Whether the body carries the given sticky marker.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.body.as_deref().is_some_and(|body| body.contains(marker))
    }
}

/// Author class selector for sticky comment lookups.
///
/// The tracker replaces its own notices but must also be able to find
/// human-authored copies of a template (title-length warnings posted by
/// members before the App takes over).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAuthorFilter {
    /// Only comments posted by the App's bot account
    Bot,
    /// Only comments posted by anyone else
    Others,
}

impl CommentAuthorFilter {
    fn matches(&self, login: &str, bot_login: &str) -> bool {
        match self {
            CommentAuthorFilter::Bot => login == bot_login,
            CommentAuthorFilter::Others => login != bot_login,
        }
    }
}

/// Request to create a comment.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCommentRequest {
    /// Comment body content (Markdown, required)
    pub body: String,
}

/// Request to update a comment.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCommentRequest {
    /// Comment body content (Markdown, required)
    pub body: String,
}

impl InstallationClient {
    // ========================================================================
    // Comment Operations
    // ========================================================================

    /// List all comments on an issue or pull request, across pages.
    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Vec<Comment>, ApiError> {
        let mut comments = Vec::new();
        let mut page = 1u32;

        loop {
            let path = format!(
                "/repos/{}/{}/issues/{}/comments?per_page=100&page={}",
                owner, repo, issue_number, page
            );
            let response = self.get(&path).await?;

            let status = response.status();
            if !status.is_success() {
                return Err(read_error(response).await);
            }

            let link = response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let batch: Vec<Comment> = response.json().await.map_err(ApiError::from)?;
            comments.extend(batch);

            match parse_link_header(link.as_deref()).next_page() {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(comments)
    }

    /// Create a comment on an issue or pull request.
    pub async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<Comment, ApiError> {
        let path = format!("/repos/{}/{}/issues/{}/comments", owner, repo, issue_number);
        let request = CreateCommentRequest {
            body: body.to_string(),
        };
        let response = self.post(&path, &request).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        response.json().await.map_err(ApiError::from)
    }

    /// Update an existing comment.
    pub async fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<Comment, ApiError> {
        let path = format!("/repos/{}/{}/issues/comments/{}", owner, repo, comment_id);
        let request = UpdateCommentRequest {
            body: body.to_string(),
        };
        let response = self.patch(&path, &request).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        response.json().await.map_err(ApiError::from)
    }

    /// Delete a comment.
    pub async fn delete_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<(), ApiError> {
        let path = format!("/repos/{}/{}/issues/comments/{}", owner, repo, comment_id);
        let response = self.delete(&path).await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        Ok(())
    }

    /// Find the first comment carrying a sticky marker, by author class.
    pub async fn find_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        marker: &str,
        author: CommentAuthorFilter,
        bot_login: &str,
    ) -> Result<Option<Comment>, ApiError> {
        let comments = self.list_issue_comments(owner, repo, issue_number).await?;
        Ok(comments
            .into_iter()
            .find(|c| c.has_marker(marker) && author.matches(&c.user.login, bot_login)))
    }

    /// Replace a sticky comment, moving it to the bottom of the thread.
    ///
    /// Deletes the previous copy (if any) before creating the new one; an
    /// in-place update would leave the notice buried under later discussion.
    pub async fn reinsert_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        marker: &str,
        author: CommentAuthorFilter,
        bot_login: &str,
        body: &str,
    ) -> Result<Comment, ApiError> {
        if let Some(previous) = self
            .find_comment(owner, repo, issue_number, marker, author, bot_login)
            .await?
        {
            self.delete_issue_comment(owner, repo, previous.id).await?;
        }

        self.create_issue_comment(owner, repo, issue_number, body)
            .await
    }
}

#[cfg(test)]
#[path = "comments_tests.rs"]
mod tests;
