//! Pull request lifecycle job.
//!
//! The settle wait at the start lets opened/synchronize bursts for the same
//! pull request land before state is read. Lifecycle rows carry ids derived
//! from the item and action, so a redelivered close produces the same row
//! it produced the first time.

use tracing::{debug, warn};

use github_app_sdk::events::{PullRequestAction, PullRequestEvent};

use crate::analytics::{lifecycle_event_id, unix_seconds, AnalyticsAction, AnalyticsEvent};
use crate::error::JobError;
use crate::jobs::fix_pr::{self, FixPrActivity};
use crate::jobs::{ensure_submission_checks, is_excluded, JobContext};
use crate::normalize::{normalize_contributor, normalize_pull_request, DEFAULT_ORG};

pub async fn handle(ctx: &JobContext, event: PullRequestEvent) -> Result<(), JobError> {
    use PullRequestAction::*;

    if !matches!(
        event.action,
        Opened | Edited | Closed | Reopened | Synchronize | ReviewRequested
    ) {
        debug!(action = ?event.action, "pull request action not tracked");
        return Ok(());
    }

    let pull_request = &event.pull_request;
    let author = &pull_request.user;
    if is_excluded(&event.sender.login) || is_excluded(&author.login) {
        debug!(
            sender = %event.sender.login,
            author = %author.login,
            "excluded account, skipping"
        );
        return Ok(());
    }

    let org = event
        .organization
        .as_ref()
        .map(|org| org.login.as_str())
        .unwrap_or(DEFAULT_ORG);
    let owner = event.repository.owner.login.as_str();
    let repo = event.repository.name.as_str();

    // Lifecycle rows are attributed to the author on both sides and carry
    // the pull request's own timestamps, so a redelivery reproduces the
    // exact same row.
    let lifecycle = match event.action {
        Opened => Some(AnalyticsAction::PrOpened),
        Closed if pull_request.is_merged() => Some(AnalyticsAction::PrMerged),
        Closed => Some(AnalyticsAction::PrClosed),
        _ => None,
    };
    if let Some(outcome) = lifecycle {
        ctx.emit(
            AnalyticsEvent::new(
                lifecycle_event_id(org, repo, pull_request.id, outcome),
                outcome,
                pull_request.id,
                org,
                repo,
                &pull_request.title,
                &author.login,
                &author.login,
            )
            .with_timestamps(
                unix_seconds(pull_request.created_at),
                unix_seconds(pull_request.updated_at),
            ),
        )
        .await?;
    }

    ctx.debounce_pull_request().await;

    let repos = ctx.repositories().await?;

    // Edits and pushes are attributed to whoever made them; lifecycle
    // transitions belong to the author.
    let actor = match event.action {
        Edited | Synchronize => &event.sender,
        _ => author,
    };
    let contributor = repos
        .contributors
        .upsert(normalize_contributor(actor))
        .await?;

    let existing = repos.items.get_by_id(pull_request.id).await?;
    let mut item = normalize_pull_request(
        existing.as_ref(),
        pull_request,
        &event.repository,
        event.organization.as_ref(),
        &contributor,
    );
    if matches!(event.action, Reopened) {
        item.closed_at = None;
    }
    let item = repos.items.upsert(item).await?;

    // Everything below talks to GitHub and is cosmetic; failures are logged
    // and the delivery still counts as processed.
    let installation = match ctx.github.for_org(owner).await {
        Ok(installation) => installation,
        Err(error) => {
            warn!(%owner, %error, "no installation for owner, skipping GitHub side effects");
            return Ok(());
        }
    };

    let fan_out_checks = matches!(event.action, ReviewRequested)
        || (matches!(event.action, Synchronize) && pull_request.has_requested_reviewers());
    if fan_out_checks {
        ensure_submission_checks(
            ctx,
            &repos,
            &installation,
            owner,
            repo,
            org,
            pull_request,
            &item,
        )
        .await;
    }

    // A body-only edit carries no previous title and triggers no fix
    // re-evaluation.
    let fix_activity = match &event.action {
        Opened => Some(FixPrActivity::Opened),
        Synchronize => Some(FixPrActivity::Synchronize),
        Closed => Some(FixPrActivity::Closed),
        Edited => event
            .changes
            .as_ref()
            .and_then(|changes| changes.title.as_ref())
            .map(|title| FixPrActivity::Edited {
                previous_title: title.from.clone(),
            }),
        _ => None,
    };
    if let Some(activity) = fix_activity {
        fix_pr::evaluate(
            ctx,
            &repos,
            &installation,
            owner,
            repo,
            org,
            pull_request,
            activity,
        )
        .await?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "pull_request_tests.rs"]
mod tests;
