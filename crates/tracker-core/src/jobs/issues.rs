//! Issue title policy job.
//!
//! Titles longer than the limit get a sticky warning comment mentioning the
//! sender. Every opened/edited delivery first deletes the previous warning,
//! so fixing the title makes the warning disappear and re-breaking it posts
//! a fresh one at the thread bottom.

use tracing::debug;

use github_app_sdk::client::CommentAuthorFilter;
use github_app_sdk::events::{IssueAction, IssueEvent};

use crate::comments::{body_with_marker, issue_marker, issue_title_warning, MAX_TITLE_LENGTH};
use crate::error::JobError;
use crate::jobs::{is_excluded, JobContext};

pub async fn handle(ctx: &JobContext, event: IssueEvent) -> Result<(), JobError> {
    if !matches!(event.action, IssueAction::Opened | IssueAction::Edited) {
        debug!(action = ?event.action, "issue action not tracked");
        return Ok(());
    }
    if event.issue.is_pull_request() {
        // The pull request facet is covered by the pull request job.
        return Ok(());
    }
    if is_excluded(&event.sender.login) {
        debug!(sender = %event.sender.login, "excluded account, skipping");
        return Ok(());
    }

    let owner = event.repository.owner.login.as_str();
    let repo = event.repository.name.as_str();
    let issue = &event.issue;
    let installation = ctx.github.for_org(owner).await?;

    let marker = issue_marker(issue.id);
    if let Some(previous) = installation
        .find_comment(
            owner,
            repo,
            issue.number,
            &marker,
            CommentAuthorFilter::Bot,
            &ctx.settings.bot_login,
        )
        .await?
    {
        installation
            .delete_issue_comment(owner, repo, previous.id)
            .await?;
    }

    if issue.title.chars().count() > MAX_TITLE_LENGTH {
        let body = body_with_marker(&issue_title_warning(&event.sender.login), &marker);
        installation
            .create_issue_comment(owner, repo, issue.number, &body)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "issues_tests.rs"]
mod tests;
