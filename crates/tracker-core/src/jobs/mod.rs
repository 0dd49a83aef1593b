//! Reconciliation jobs.
//!
//! One job per webhook family. Jobs are idempotent: deliveries arrive
//! unordered, duplicated and racing each other, so every handler re-reads
//! current state, merges monotonically and writes upserts keyed on business
//! ids. Deliberate debounce waits let near-simultaneous deliveries for the
//! same logical change settle before state is read.
//!
//! Failure policy: persistence of contributors and items is the source of
//! truth and propagates errors so the delivery can be retried. GitHub-side
//! cosmetics (comments, check runs) are logged at the call site and never
//! abort the job.

pub mod check_run;
pub mod fix_pr;
pub mod issue_comment;
pub mod issues;
pub mod pull_request;
pub mod review;

use rand::RngExt;
use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use doc_store::StoreGateway;
use github_app_sdk::client::{
    CheckRun, CommentAuthorFilter, CreateCheckRunRequest, InstallationClient, PullRequest,
};
use github_app_sdk::events::WebhookEvent;
use github_app_sdk::GitHubClient;

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::comments::{
    add_mention, body_with_marker, parse_mentions, pull_request_marker, remove_mention,
    submit_hours_body,
};
use crate::entities::Item;
use crate::error::JobError;
use crate::repositories::Repositories;
use crate::trigger::{CheckRunKind, CheckRunTrigger, TriggerClient};

/// Accounts whose activity is never tracked: automation that opens or
/// touches pull requests without being an invoiceable contributor.
pub const EXCLUDED_ACCOUNTS: &[&str] = &[
    "coderabbitai[bot]",
    "coderabbitai",
    "github-advanced-security[bot]",
    "dependabot[bot]",
    "pr-time-tracker",
];

/// Name prefix of the per-contributor hours check.
pub const SUBMISSION_CHECK_PREFIX: &str = "Cost Submission";

/// Name prefix of the fix-PR bug report check.
pub const BUG_CHECK_PREFIX: &str = "Bug Report Info";

static SUBMISSION_CHECK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Cost Submission \((.+)\)$").expect("check pattern compiles"));
static BUG_CHECK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Bug Report Info \((.+)\)$").expect("check pattern compiles"));

pub fn is_excluded(login: &str) -> bool {
    EXCLUDED_ACCOUNTS.contains(&login)
}

pub fn submission_check_name(login: &str) -> String {
    format!("{SUBMISSION_CHECK_PREFIX} ({login})")
}

pub fn bug_check_name(login: &str) -> String {
    format!("{BUG_CHECK_PREFIX} ({login})")
}

/// Recover the check family and contributor login from a check run name.
pub fn parse_check_name(name: &str) -> Option<(CheckRunKind, String)> {
    if let Some(captures) = SUBMISSION_CHECK.captures(name) {
        return Some((CheckRunKind::Submission, captures[1].to_string()));
    }
    if let Some(captures) = BUG_CHECK.captures(name) {
        return Some((CheckRunKind::BugReport, captures[1].to_string()));
    }
    None
}

/// Runtime knobs for the job layer.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Login the app's own comments are authored under
    pub bot_login: String,

    /// Base URL of the tracker frontend, used for check run details links
    pub details_url_base: String,

    /// Contributor id granted the manager role at creation time
    pub bootstrap_manager_id: Option<u64>,

    /// Settle time before pull request and review jobs read state
    pub pull_request_debounce: Duration,

    /// Bounds of the randomized settle time before check run jobs run
    pub check_run_debounce_min: Duration,
    pub check_run_debounce_max: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            bot_login: "pr-time-tracker[bot]".to_string(),
            details_url_base: "https://pr-time-tracker.vercel.app".to_string(),
            bootstrap_manager_id: None,
            pull_request_debounce: Duration::from_secs(5),
            check_run_debounce_min: Duration::from_secs(3),
            check_run_debounce_max: Duration::from_secs(6),
        }
    }
}

impl JobSettings {
    /// Settings with debounce waits removed, for tests that drive jobs
    /// synchronously.
    pub fn immediate() -> Self {
        Self {
            pull_request_debounce: Duration::ZERO,
            check_run_debounce_min: Duration::ZERO,
            check_run_debounce_max: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Everything a job needs: store access, GitHub access, the analytics sink,
/// the trigger handoff and the runtime knobs.
#[derive(Clone)]
pub struct JobContext {
    store: Arc<StoreGateway>,
    pub github: GitHubClient,
    pub sink: Arc<dyn AnalyticsSink>,
    pub trigger: TriggerClient,
    pub settings: JobSettings,
}

impl JobContext {
    pub fn new(
        store: Arc<StoreGateway>,
        github: GitHubClient,
        sink: Arc<dyn AnalyticsSink>,
        trigger: TriggerClient,
        settings: JobSettings,
    ) -> Self {
        Self {
            store,
            github,
            sink,
            trigger,
            settings,
        }
    }

    /// Repositories over a freshly acquired store handle.
    pub async fn repositories(&self) -> Result<Repositories, JobError> {
        let handle = self.store.acquire().await?;
        Ok(Repositories::new(
            &handle,
            self.settings.bootstrap_manager_id,
        ))
    }

    /// Frontend link attached to check runs.
    pub fn details_url(&self, org: &str, repo: &str, item_id: u64) -> String {
        format!(
            "{}/prs/{org}/{repo}/{item_id}",
            self.settings.details_url_base.trim_end_matches('/')
        )
    }

    /// Record an analytics row; the deterministic id makes retries safe.
    pub async fn emit(&self, event: AnalyticsEvent) -> Result<(), JobError> {
        self.sink.insert(&event).await
    }

    /// Settle wait before pull request and review jobs read state.
    pub async fn debounce_pull_request(&self) {
        if !self.settings.pull_request_debounce.is_zero() {
            tokio::time::sleep(self.settings.pull_request_debounce).await;
        }
    }

    /// Randomized settle wait before check run jobs read state; the jitter
    /// spreads out bursts of near-simultaneous check deliveries.
    pub async fn debounce_check_run(&self) {
        let min = self.settings.check_run_debounce_min;
        let max = self.settings.check_run_debounce_max;
        if max.is_zero() {
            return;
        }
        let wait = if min >= max {
            min
        } else {
            rand::rng().random_range(min..=max)
        };
        tokio::time::sleep(wait).await;
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Route a parsed webhook delivery to its job.
pub async fn dispatch(ctx: &JobContext, event: WebhookEvent) -> Result<(), JobError> {
    match event {
        WebhookEvent::PullRequest(event) => pull_request::handle(ctx, event).await,
        WebhookEvent::PullRequestReview(event) => review::handle(ctx, event).await,
        WebhookEvent::Issues(event) => issues::handle(ctx, event).await,
        WebhookEvent::IssueComment(event) => issue_comment::handle(ctx, event).await,
        WebhookEvent::CheckRun(event) => check_run::handle(ctx, event).await,
        WebhookEvent::Unsupported { event } => {
            debug!(event = %event, "no job for event family");
            Ok(())
        }
    }
}

/// Locate the pull request a check run belongs to.
///
/// The payload usually carries the PR directly; forked PRs arrive with an
/// empty list, leaving the suite's head branch as the remaining hook.
pub(crate) async fn resolve_pull_request(
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    check_run: &CheckRun,
) -> Result<Option<PullRequest>, JobError> {
    if let Some(reference) = check_run.pull_requests.first() {
        let pr = installation
            .get_pull_request(owner, repo, reference.number)
            .await?;
        return Ok(Some(pr));
    }

    if let Some(branch) = check_run
        .check_suite
        .as_ref()
        .and_then(|suite| suite.head_branch.as_deref())
    {
        return Ok(installation
            .find_pull_request_by_head(owner, repo, branch)
            .await?);
    }

    Ok(None)
}

/// Make sure a check run exists for one contributor on a pull request head.
///
/// An existing run is not recreated; its re-evaluation is handed to the
/// trigger endpoint so it runs as a fresh job against current state.
pub(crate) async fn ensure_check_run(
    ctx: &JobContext,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    org: &str,
    pull_request: &PullRequest,
    login: &str,
    contributor_id: u64,
    kind: CheckRunKind,
) -> Result<(), JobError> {
    let name = match kind {
        CheckRunKind::Submission => submission_check_name(login),
        CheckRunKind::BugReport => bug_check_name(login),
    };

    let existing = installation
        .list_check_runs_for_ref(owner, repo, &pull_request.head.sha, Some(&name))
        .await?;

    if let Some(run) = existing.first() {
        ctx.trigger
            .request_check_run(&CheckRunTrigger {
                kind,
                organization: owner.to_string(),
                repo: repo.to_string(),
                sender_login: login.to_string(),
                sender_id: contributor_id,
                pr_number: pull_request.number,
                pr_id: Some(pull_request.id),
                check_run_id: Some(run.id),
            })
            .await?;
        return Ok(());
    }

    let request = CreateCheckRunRequest::queued(name, pull_request.head.sha.clone())
        .with_details_url(ctx.details_url(org, repo, pull_request.id));
    installation.create_check_run(owner, repo, request).await?;
    Ok(())
}

/// Ensure a submission check run per non-excluded contributor on the item.
///
/// The per-contributor tasks run concurrently and are awaited all-settled;
/// one contributor's failure is logged without disturbing the rest.
pub(crate) async fn ensure_submission_checks(
    ctx: &JobContext,
    repos: &Repositories,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    org: &str,
    pull_request: &PullRequest,
    item: &Item,
) {
    let tasks = item.contributor_ids.iter().map(|&contributor_id| async move {
        let contributor = match repos.contributors.get_by_id(contributor_id).await {
            Ok(Some(contributor)) => contributor,
            Ok(None) => {
                debug!(contributor_id, "contributor on item is unknown, skipping check");
                return;
            }
            Err(error) => {
                warn!(contributor_id, %error, "contributor lookup failed");
                return;
            }
        };
        if is_excluded(&contributor.login) {
            return;
        }
        if let Err(error) = ensure_check_run(
            ctx,
            installation,
            owner,
            repo,
            org,
            pull_request,
            &contributor.login,
            contributor.id,
            CheckRunKind::Submission,
        )
        .await
        {
            warn!(login = %contributor.login, %error, "submission check setup failed");
        }
    });

    futures::future::join_all(tasks).await;
}

/// Bump the "submit your hours" sticky comment to the thread bottom.
///
/// An existing comment is re-posted with its current body so it stays the
/// last thing in the thread. When none exists there is nothing to bump; the
/// mention list lives and dies with check run evaluation.
pub(crate) async fn bump_hours_comment(
    ctx: &JobContext,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    item: &Item,
) -> Result<(), JobError> {
    let marker = pull_request_marker(item.id);

    let Some(previous) = installation
        .find_comment(
            owner,
            repo,
            item.number,
            &marker,
            CommentAuthorFilter::Bot,
            &ctx.settings.bot_login,
        )
        .await?
    else {
        return Ok(());
    };

    let body = previous.body.clone().unwrap_or_default();
    installation
        .delete_issue_comment(owner, repo, previous.id)
        .await?;
    installation
        .create_issue_comment(owner, repo, item.number, &body)
        .await?;
    Ok(())
}

/// Adjust one login's entry in the sticky hours comment after a check run
/// evaluation: satisfied contributors drop off the list, unsatisfied ones
/// join it, and an empty list deletes the comment entirely.
pub(crate) async fn adjust_hours_comment(
    ctx: &JobContext,
    installation: &InstallationClient,
    owner: &str,
    repo: &str,
    org: &str,
    pull_request: &PullRequest,
    login: &str,
    satisfied: bool,
) -> Result<(), JobError> {
    let marker = pull_request_marker(pull_request.id);
    let previous = installation
        .find_comment(
            owner,
            repo,
            pull_request.number,
            &marker,
            CommentAuthorFilter::Bot,
            &ctx.settings.bot_login,
        )
        .await?;

    let mut mentions = previous
        .as_ref()
        .and_then(|comment| comment.body.as_deref())
        .map(parse_mentions)
        .unwrap_or_default();

    if satisfied {
        remove_mention(&mut mentions, login);
    } else {
        add_mention(&mut mentions, login);
    }

    if mentions.is_empty() {
        if let Some(comment) = previous {
            installation
                .delete_issue_comment(owner, repo, comment.id)
                .await?;
        }
        return Ok(());
    }

    let body = body_with_marker(
        &submit_hours_body(&mentions, &ctx.details_url(org, repo, pull_request.id)),
        &marker,
    );
    if let Some(comment) = previous {
        installation
            .delete_issue_comment(owner, repo, comment.id)
            .await?;
    }
    installation
        .create_issue_comment(owner, repo, pull_request.number, &body)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
