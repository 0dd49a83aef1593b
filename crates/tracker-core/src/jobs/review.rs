//! Pull request review job.
//!
//! A submitted review adds the reviewer to the item's contributor set,
//! bumps the sticky hours comment back to the thread bottom where the
//! reviewer will see it, and refreshes every contributor's submission
//! check. Approvals additionally produce two analytics rows, one from the
//! reviewer's perspective and one from the PR owner's.

use tracing::{debug, warn};

use github_app_sdk::events::{PullRequestReviewAction, PullRequestReviewEvent};

use crate::analytics::{
    actor_event_id, now_unix_seconds, unix_seconds, AnalyticsAction, AnalyticsEvent,
};
use crate::error::JobError;
use crate::jobs::{bump_hours_comment, ensure_submission_checks, is_excluded, JobContext};
use crate::normalize::{normalize_contributor, normalize_pull_request, DEFAULT_ORG};

pub async fn handle(ctx: &JobContext, event: PullRequestReviewEvent) -> Result<(), JobError> {
    if event.action != PullRequestReviewAction::Submitted {
        debug!(action = ?event.action, "review action not tracked");
        return Ok(());
    }

    let reviewer = &event.review.user;
    if is_excluded(&event.sender.login) || is_excluded(&reviewer.login) {
        debug!(reviewer = %reviewer.login, "excluded account, skipping");
        return Ok(());
    }

    let pull_request = &event.pull_request;
    let org = event
        .organization
        .as_ref()
        .map(|org| org.login.as_str())
        .unwrap_or(DEFAULT_ORG);
    let owner = event.repository.owner.login.as_str();
    let repo = event.repository.name.as_str();

    ctx.debounce_pull_request().await;

    if event.review.is_approval() {
        // The timestamp salt comes from the review itself so a redelivery
        // regenerates the same ids while a second approval gets new ones.
        let submitted = event
            .review
            .submitted_at
            .map(unix_seconds)
            .unwrap_or_else(now_unix_seconds);

        let timestamps = (
            unix_seconds(pull_request.created_at),
            unix_seconds(pull_request.updated_at),
        );

        ctx.emit(
            AnalyticsEvent::new(
                actor_event_id(
                    org,
                    repo,
                    pull_request.id,
                    &reviewer.login,
                    &submitted,
                    AnalyticsAction::PrReviewApprove,
                ),
                AnalyticsAction::PrReviewApprove,
                pull_request.id,
                org,
                repo,
                &pull_request.title,
                &reviewer.login,
                &reviewer.login,
            )
            .with_timestamps(timestamps.0.clone(), timestamps.1.clone()),
        )
        .await?;

        ctx.emit(
            AnalyticsEvent::new(
                actor_event_id(
                    org,
                    repo,
                    pull_request.id,
                    &reviewer.login,
                    &submitted,
                    AnalyticsAction::PrApproved,
                ),
                AnalyticsAction::PrApproved,
                pull_request.id,
                org,
                repo,
                &pull_request.title,
                &pull_request.user.login,
                &reviewer.login,
            )
            .with_timestamps(timestamps.0, timestamps.1),
        )
        .await?;
    }

    let repos = ctx.repositories().await?;
    let contributor = repos
        .contributors
        .upsert(normalize_contributor(reviewer))
        .await?;

    let existing = repos.items.get_by_id(pull_request.id).await?;
    let item = normalize_pull_request(
        existing.as_ref(),
        pull_request,
        &event.repository,
        event.organization.as_ref(),
        &contributor,
    );
    let item = repos.items.upsert(item).await?;

    let installation = match ctx.github.for_org(owner).await {
        Ok(installation) => installation,
        Err(error) => {
            warn!(%owner, %error, "no installation for owner, skipping GitHub side effects");
            return Ok(());
        }
    };

    if let Err(error) = bump_hours_comment(ctx, &installation, owner, repo, &item).await {
        warn!(number = item.number, %error, "hours comment bump failed");
    }

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

    Ok(())
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
