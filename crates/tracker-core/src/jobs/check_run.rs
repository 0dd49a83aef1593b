//! Check run evaluation job.
//!
//! Our check runs are created queued and evaluated here, either from the
//! `check_run.created`/`rerequested` webhook or from the HTTP trigger
//! endpoint after a submission changes. Evaluation reads current store
//! state and writes a completed conclusion, so re-running it any number of
//! times converges on the same result.

use tracing::{debug, warn};

use github_app_sdk::client::{
    CheckRunConclusion, CommentAuthorFilter, InstallationClient, PullRequest,
    UpdateCheckRunRequest,
};
use github_app_sdk::events::{CheckRunAction, CheckRunEvent};

use crate::comments::{bug_report_warning, BUG_WARNING_FRAGMENT};
use crate::error::JobError;
use crate::jobs::fix_pr::matches_bug_command;
use crate::jobs::{
    adjust_hours_comment, bug_check_name, parse_check_name, resolve_pull_request,
    submission_check_name, JobContext,
};
use crate::normalize::DEFAULT_ORG;
use crate::repositories::Repositories;
use crate::trigger::{CheckRunKind, CheckRunTrigger};

pub async fn handle(ctx: &JobContext, event: CheckRunEvent) -> Result<(), JobError> {
    if !matches!(
        event.action,
        CheckRunAction::Created | CheckRunAction::Rerequested
    ) {
        debug!(action = ?event.action, "check run action not tracked");
        return Ok(());
    }
    let Some((kind, login)) = parse_check_name(&event.check_run.name) else {
        debug!(name = %event.check_run.name, "foreign check run, ignoring");
        return Ok(());
    };

    // Check deliveries arrive in bursts right after creation; the jittered
    // wait lets the store writes they race against land first.
    ctx.debounce_check_run().await;

    let owner = event.repository.owner.login.as_str();
    let repo = event.repository.name.as_str();
    let org = event
        .organization
        .as_ref()
        .map(|org| org.login.as_str())
        .unwrap_or(DEFAULT_ORG);
    let installation = ctx.github.for_org(owner).await?;

    let Some(pull_request) =
        resolve_pull_request(&installation, owner, repo, &event.check_run).await?
    else {
        warn!(
            name = %event.check_run.name,
            "check run has no reachable pull request"
        );
        return Ok(());
    };

    let repos = ctx.repositories().await?;
    match kind {
        CheckRunKind::Submission => {
            evaluate_submission(
                ctx,
                &repos,
                &installation,
                owner,
                repo,
                org,
                &pull_request,
                &login,
                event.check_run.id,
            )
            .await
        }
        CheckRunKind::BugReport => {
            evaluate_bug(
                ctx,
                &installation,
                owner,
                repo,
                org,
                &pull_request,
                &login,
                event.check_run.id,
            )
            .await
        }
    }
}

/// Re-evaluation handed over from the HTTP trigger endpoint.
///
/// Submissions change through the API, not through webhooks, so the API
/// asks for a re-run here. Without a check run id the run is located by
/// name on the current head; a pull request without one needs nothing.
pub async fn handle_trigger(ctx: &JobContext, trigger: CheckRunTrigger) -> Result<(), JobError> {
    let owner = trigger.organization.as_str();
    let repo = trigger.repo.as_str();
    let installation = ctx.github.for_org(owner).await?;
    let pull_request = installation
        .get_pull_request(owner, repo, trigger.pr_number)
        .await?;

    let check_run_id = match trigger.check_run_id {
        Some(id) => Some(id),
        None => {
            let name = match trigger.kind {
                CheckRunKind::Submission => submission_check_name(&trigger.sender_login),
                CheckRunKind::BugReport => bug_check_name(&trigger.sender_login),
            };
            installation
                .list_check_runs_for_ref(owner, repo, &pull_request.head.sha, Some(&name))
                .await?
                .first()
                .map(|run| run.id)
        }
    };
    let Some(check_run_id) = check_run_id else {
        debug!(login = %trigger.sender_login, "no check run to re-evaluate");
        return Ok(());
    };

    let repos = ctx.repositories().await?;
    match trigger.kind {
        CheckRunKind::Submission => {
            evaluate_submission(
                ctx,
                &repos,
                &installation,
                owner,
                repo,
                owner,
                &pull_request,
                &trigger.sender_login,
                check_run_id,
            )
            .await
        }
        CheckRunKind::BugReport => {
            evaluate_bug(
                ctx,
                &installation,
                owner,
                repo,
                owner,
                &pull_request,
                &trigger.sender_login,
                check_run_id,
            )
            .await
        }
    }
}

/// Conclude the hours check from whether a submission exists for
/// (contributor, item), then fix up the sticky mention list to match.
#[allow(clippy::too_many_arguments)]
async fn evaluate_submission(
    ctx: &JobContext,
    repos: &Repositories,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    org: &str,
    pull_request: &PullRequest,
    login: &str,
    check_run_id: u64,
) -> Result<(), JobError> {
    let contributor = repos.contributors.get_by_login(login).await?;
    let submission = match &contributor {
        Some(contributor) => {
            repos
                .submissions
                .get_by_owner_and_item(contributor.id, pull_request.id)
                .await?
        }
        None => None,
    };

    let update = match &submission {
        Some(submission) => UpdateCheckRunRequest::completed(CheckRunConclusion::Success)
            .with_output(
                "Hours submitted",
                format!("@{login} submitted {} hours.", submission.hours),
            ),
        None => UpdateCheckRunRequest::completed(CheckRunConclusion::Failure).with_output(
            "Waiting for hours",
            format!(
                "@{login} please submit the time spent on this pull request \
                 via the PR Time Tracker app."
            ),
        ),
    };
    installation
        .update_check_run(
            owner,
            repo,
            check_run_id,
            update.with_details_url(ctx.details_url(org, repo, pull_request.id)),
        )
        .await?;

    if let Err(error) = adjust_hours_comment(
        ctx,
        installation,
        owner,
        repo,
        org,
        pull_request,
        login,
        submission.is_some(),
    )
    .await
    {
        warn!(%login, %error, "hours comment adjustment failed");
    }
    Ok(())
}

/// Conclude the bug check from whether any non-bot comment is a bug report
/// command, then keep the warning comment in step with the conclusion.
#[allow(clippy::too_many_arguments)]
async fn evaluate_bug(
    ctx: &JobContext,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    org: &str,
    pull_request: &PullRequest,
    login: &str,
    check_run_id: u64,
) -> Result<(), JobError> {
    let comments = installation
        .list_issue_comments(owner, repo, pull_request.number)
        .await?;
    let reported = comments.iter().any(|comment| {
        comment.user.login != ctx.settings.bot_login
            && comment.body.as_deref().is_some_and(matches_bug_command)
    });

    let update = if reported {
        UpdateCheckRunRequest::completed(CheckRunConclusion::Success).with_output(
            "Bug report received",
            "A comment names the commit that introduced this bug.",
        )
    } else {
        UpdateCheckRunRequest::completed(CheckRunConclusion::Failure).with_output(
            "Bug report missing",
            "No comment names the commit that introduced this bug yet.",
        )
    };
    installation
        .update_check_run(
            owner,
            repo,
            check_run_id,
            update.with_details_url(ctx.details_url(org, repo, pull_request.id)),
        )
        .await?;

    if reported {
        match installation
            .find_comment(
                owner,
                repo,
                pull_request.number,
                BUG_WARNING_FRAGMENT,
                CommentAuthorFilter::Bot,
                &ctx.settings.bot_login,
            )
            .await
        {
            Ok(Some(warning)) => {
                if let Err(error) = installation
                    .delete_issue_comment(owner, repo, warning.id)
                    .await
                {
                    warn!(%error, "stale bug warning removal failed");
                }
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "bug warning lookup failed"),
        }
    } else if let Err(error) = installation
        .reinsert_comment(
            owner,
            repo,
            pull_request.number,
            BUG_WARNING_FRAGMENT,
            CommentAuthorFilter::Bot,
            &ctx.settings.bot_login,
            &bug_report_warning(login),
        )
        .await
    {
        warn!(%error, "bug warning reinsertion failed");
    }
    Ok(())
}

#[cfg(test)]
#[path = "check_run_tests.rs"]
mod tests;
