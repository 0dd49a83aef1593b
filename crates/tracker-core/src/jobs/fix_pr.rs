//! Fix pull request policy.
//!
//! A pull request whose title matches the conventional `fix:` / `fix(scope):`
//! form must name the commit that introduced the bug before it merges. The
//! report arrives as a comment in a fixed grammar; until one exists the
//! author's `Bug Report Info` check run fails and a warning comment explains
//! the expected format. On merge, the report comment becomes a stored bug
//! report record and an analytics row.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use doc_store::StoreError;
use github_app_sdk::client::{
    CheckRunConclusion, CommentAuthorFilter, InstallationClient, PullRequest,
    UpdateCheckRunRequest,
};

use crate::analytics::{bug_report_event_id, unix_seconds, AnalyticsAction, AnalyticsEvent};
use crate::comments::BUG_WARNING_FRAGMENT;
use crate::entities::BugReport;
use crate::error::JobError;
use crate::jobs::{bug_check_name, ensure_check_run, JobContext};
use crate::repositories::Repositories;
use crate::trigger::CheckRunKind;

static FIX_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^fix(\(.+\))?:").expect("fix title pattern compiles"));

static BUG_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@pr-time-tracker bug commit (.+) && bug author @(\S+)")
        .expect("bug command pattern compiles")
});

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]\(([^)]+)\)").expect("link pattern compiles"));

/// Whether a title declares a fix in the conventional-commit form.
pub fn is_fix_title(title: &str) -> bool {
    FIX_TITLE.is_match(title)
}

/// Whether an edit retitled the pull request from a fix to a non-fix.
pub fn title_changed_away_from_fix(previous: &str, current: &str) -> bool {
    is_fix_title(previous) && !is_fix_title(current)
}

/// Whether a comment body is a bug report command.
pub fn matches_bug_command(body: &str) -> bool {
    BUG_COMMAND.is_match(body.trim())
}

/// Whether an edit changed a comment's bug-command status in either
/// direction; unchanged status needs no re-evaluation.
pub fn comment_toggles_bug_command(previous: &str, current: &str) -> bool {
    matches_bug_command(previous) != matches_bug_command(current)
}

/// A parsed bug report command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugCommand {
    /// Link to the commit that introduced the bug, unwrapped from markdown
    /// when the client auto-linked it
    pub commit_link: String,

    /// Login named after `bug author`
    pub bug_author_login: String,
}

pub fn parse_bug_command(body: &str) -> Option<BugCommand> {
    let captures = BUG_COMMAND.captures(body.trim())?;
    let raw_link = captures[1].trim();
    let commit_link = MARKDOWN_LINK
        .captures(raw_link)
        .map(|link| link[1].to_string())
        .unwrap_or_else(|| raw_link.to_string());
    Some(BugCommand {
        commit_link,
        bug_author_login: captures[2].to_string(),
    })
}

/// What brought the pull request up for fix evaluation.
#[derive(Debug, Clone)]
pub enum FixPrActivity {
    Opened,
    Synchronize,
    Edited { previous_title: String },
    Closed,
    Comment,
}

/// Evaluate the fix policy for one pull request.
///
/// Merged fix PRs are mined for their bug report; open fix PRs get the bug
/// check run; PRs retitled away from `fix:` have the warning and check
/// retired. Drafts are left alone until they are ready.
///
/// Record and analytics failures propagate so the delivery is retried;
/// check run and comment failures are only logged.
pub(crate) async fn evaluate(
    ctx: &JobContext,
    repos: &Repositories,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    org: &str,
    pull_request: &PullRequest,
    activity: FixPrActivity,
) -> Result<(), JobError> {
    match &activity {
        FixPrActivity::Closed => {
            if pull_request.is_merged() && is_fix_title(&pull_request.title) {
                process_bug_report(ctx, repos, installation, owner, repo, org, pull_request)
                    .await?;
            }
            return Ok(());
        }
        // A report comment landing after the merge still converges: the
        // record and analytics row are created as if it had been there at
        // close time.
        FixPrActivity::Comment if pull_request.is_merged() => {
            if is_fix_title(&pull_request.title) {
                process_bug_report(ctx, repos, installation, owner, repo, org, pull_request)
                    .await?;
            }
            return Ok(());
        }
        FixPrActivity::Edited { previous_title }
            if title_changed_away_from_fix(previous_title, &pull_request.title) =>
        {
            if let Err(error) =
                retire_fix_checks(ctx, installation, owner, repo, pull_request).await
            {
                warn!(number = pull_request.number, %error, "fix check retirement failed");
            }
            return Ok(());
        }
        _ => {}
    }

    if pull_request.draft {
        debug!(
            number = pull_request.number,
            "draft pull request, fix evaluation deferred"
        );
        return Ok(());
    }

    if !is_fix_title(&pull_request.title) {
        return Ok(());
    }

    let author = &pull_request.user;
    if let Err(error) = ensure_check_run(
        ctx,
        installation,
        owner,
        repo,
        org,
        pull_request,
        &author.login,
        author.id,
        CheckRunKind::BugReport,
    )
    .await
    {
        warn!(number = pull_request.number, %error, "bug check setup failed");
    }
    Ok(())
}

/// Turn the report comment of a merged fix PR into a stored record and an
/// analytics row. Without a report comment the merge simply goes untracked;
/// the failed check run already told the author what was missing.
async fn process_bug_report(
    ctx: &JobContext,
    repos: &Repositories,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    org: &str,
    pull_request: &PullRequest,
) -> Result<(), JobError> {
    let comments = installation
        .list_issue_comments(owner, repo, pull_request.number)
        .await?;
    let report = comments.iter().find(|comment| {
        comment.user.login != ctx.settings.bot_login
            && comment.body.as_deref().is_some_and(matches_bug_command)
    });

    let Some(report) = report else {
        debug!(
            number = pull_request.number,
            "merged fix pull request has no bug report comment"
        );
        return Ok(());
    };
    let Some(command) = report.body.as_deref().and_then(parse_bug_command) else {
        return Ok(());
    };
    let reporter_login = report.user.login.clone();

    let bug_author = repos
        .contributors
        .get_by_login(&command.bug_author_login)
        .await?;
    let reporter = repos.contributors.get_by_login(&reporter_login).await?;

    let record = BugReport {
        item_id: pull_request.id,
        commit_link: command.commit_link.clone(),
        bug_author_login: command.bug_author_login.clone(),
        bug_author_id: bug_author.map(|contributor| contributor.id),
        reporter_login: reporter_login.clone(),
        reporter_id: reporter.map(|contributor| contributor.id),
        created_at: None,
        updated_at: None,
    };
    match repos.bug_reports.create(record).await {
        Ok(_) => {}
        Err(JobError::Store(StoreError::DuplicateKey { .. })) => {
            debug!(item_id = pull_request.id, "bug report already recorded");
        }
        Err(error) => return Err(error),
    }

    ctx.emit(
        AnalyticsEvent::new(
            bug_report_event_id(org, repo, pull_request.id, AnalyticsAction::BugIntroduced),
            AnalyticsAction::BugIntroduced,
            pull_request.id,
            org,
            repo,
            &pull_request.title,
            &command.bug_author_login,
            &reporter_login,
        )
        .with_label(command.commit_link)
        .with_timestamps(
            unix_seconds(pull_request.created_at),
            unix_seconds(pull_request.updated_at),
        ),
    )
    .await
}

/// The title no longer declares a fix: drop the warning comment and close
/// the bug check run as neutral.
async fn retire_fix_checks(
    ctx: &JobContext,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    pull_request: &PullRequest,
) -> Result<(), JobError> {
    if let Some(warning) = installation
        .find_comment(
            owner,
            repo,
            pull_request.number,
            BUG_WARNING_FRAGMENT,
            CommentAuthorFilter::Bot,
            &ctx.settings.bot_login,
        )
        .await?
    {
        installation
            .delete_issue_comment(owner, repo, warning.id)
            .await?;
    }

    let name = bug_check_name(&pull_request.user.login);
    let runs = installation
        .list_check_runs_for_ref(owner, repo, &pull_request.head.sha, Some(&name))
        .await?;
    if let Some(run) = runs.first() {
        installation
            .update_check_run(
                owner,
                repo,
                run.id,
                UpdateCheckRunRequest::completed(CheckRunConclusion::Neutral).with_output(
                    "Bug report no longer required",
                    "The pull request title no longer declares a fix.",
                ),
            )
            .await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "fix_pr_tests.rs"]
mod tests;
