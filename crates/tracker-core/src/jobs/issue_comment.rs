//! Issue comment job, for comments on pull request threads.
//!
//! A fresh human comment bumps the sticky hours comment back to the thread
//! bottom and runs the fix evaluation, since the comment may be the bug
//! report a fix PR is waiting for. Edits and deletions only matter when
//! they change whether a comment is a bug report command.

use tracing::{debug, warn};

use github_app_sdk::client::{InstallationClient, PullRequest};
use github_app_sdk::events::{IssueCommentAction, IssueCommentEvent};

use crate::error::JobError;
use crate::jobs::fix_pr::{self, comment_toggles_bug_command, matches_bug_command, FixPrActivity};
use crate::jobs::{bump_hours_comment, is_excluded, JobContext};
use crate::normalize::DEFAULT_ORG;

pub async fn handle(ctx: &JobContext, event: IssueCommentEvent) -> Result<(), JobError> {
    if !event.issue.is_pull_request() {
        debug!(
            number = event.issue.number,
            "comment on plain issue, nothing to do"
        );
        return Ok(());
    }

    match event.action {
        IssueCommentAction::Created => handle_created(ctx, &event).await,
        IssueCommentAction::Edited => {
            let previous = event
                .changes
                .as_ref()
                .and_then(|changes| changes.body.as_ref())
                .map(|body| body.from.as_str())
                .unwrap_or_default();
            let current = event.comment.body.as_deref().unwrap_or_default();
            if !comment_toggles_bug_command(previous, current) {
                return Ok(());
            }
            evaluate_fix(ctx, &event).await
        }
        IssueCommentAction::Deleted => {
            let body = event.comment.body.as_deref().unwrap_or_default();
            if !matches_bug_command(body) {
                return Ok(());
            }
            evaluate_fix(ctx, &event).await
        }
    }
}

async fn handle_created(ctx: &JobContext, event: &IssueCommentEvent) -> Result<(), JobError> {
    // The bot's own sticky re-posts come back as created deliveries;
    // reacting to them would bump forever.
    if event.comment.user.login == ctx.settings.bot_login {
        return Ok(());
    }
    if is_excluded(&event.sender.login) {
        debug!(sender = %event.sender.login, "excluded account, skipping");
        return Ok(());
    }

    let Some((installation, pull_request)) = resolve(ctx, event).await? else {
        return Ok(());
    };
    let owner = event.repository.owner.login.as_str();
    let repo = event.repository.name.as_str();

    let repos = ctx.repositories().await?;
    if let Some(item) = repos.items.get_by_id(pull_request.id).await? {
        if let Err(error) = bump_hours_comment(ctx, &installation, owner, repo, &item).await {
            warn!(number = item.number, %error, "hours comment bump failed");
        }
    }

    fix_pr::evaluate(
        ctx,
        &repos,
        &installation,
        owner,
        repo,
        event_org(event),
        &pull_request,
        FixPrActivity::Comment,
    )
    .await
}

async fn evaluate_fix(ctx: &JobContext, event: &IssueCommentEvent) -> Result<(), JobError> {
    let Some((installation, pull_request)) = resolve(ctx, event).await? else {
        return Ok(());
    };
    let repos = ctx.repositories().await?;
    fix_pr::evaluate(
        ctx,
        &repos,
        &installation,
        &event.repository.owner.login,
        &event.repository.name,
        event_org(event),
        &pull_request,
        FixPrActivity::Comment,
    )
    .await
}

fn event_org(event: &IssueCommentEvent) -> &str {
    event
        .organization
        .as_ref()
        .map(|org| org.login.as_str())
        .unwrap_or(DEFAULT_ORG)
}

async fn resolve(
    ctx: &JobContext,
    event: &IssueCommentEvent,
) -> Result<Option<(InstallationClient, PullRequest)>, JobError> {
    let owner = event.repository.owner.login.as_str();
    let repo = event.repository.name.as_str();
    let installation = ctx.github.for_org(owner).await?;
    let pull_request = installation
        .pull_request_for_issue(owner, repo, event.issue.number)
        .await?;
    if pull_request.is_none() {
        warn!(
            number = event.issue.number,
            "pull request behind comment thread not found"
        );
    }
    Ok(pull_request.map(|pull_request| (installation, pull_request)))
}

#[cfg(test)]
#[path = "issue_comment_tests.rs"]
mod tests;
