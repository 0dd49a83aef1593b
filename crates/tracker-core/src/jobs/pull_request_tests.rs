use super::*;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::jobs::tests::harness::{
    self, actor, check_run_json, context, from_value, merged, pull_request_event,
    pull_request_event_json, pull_request_json, HEAD_SHA, ORG, PR_CREATED_UNIX, PR_UPDATED_UNIX,
    REPO,
};

// ============================================================================
// Lifecycle rows and persistence
// ============================================================================

#[tokio::test]
async fn test_opened_persists_the_item_and_emits_one_row() {
    let server = MockServer::start().await;
    let test = context(&server);
    let event = pull_request_event(
        "opened",
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(7, "alice"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    let repos = test.repositories().await;
    let contributor = repos
        .contributors
        .get_by_id(7)
        .await
        .unwrap()
        .expect("author should be persisted");
    assert_eq!(contributor.login, "alice");

    let item = repos
        .items
        .get_by_id(901)
        .await
        .unwrap()
        .expect("item should be persisted");
    assert_eq!(item.org, ORG);
    assert_eq!(item.repo, REPO);
    assert_eq!(item.owner, "alice");
    assert_eq!(item.number, 42);
    assert_eq!(item.title, "Add retries");
    assert_eq!(item.url, "https://github.com/holdex/tracker/pull/42");
    assert_eq!(item.contributor_ids, vec![7]);
    assert!(!item.merged);

    let events = test.sink.events();
    assert_eq!(events.len(), 1);
    let row = &events[0];
    assert_eq!(row.dedup_id, "holdex/tracker@901_pr_opened");
    assert_eq!(row.action, AnalyticsAction::PrOpened);
    assert_eq!(row.event_id, 901);
    assert_eq!(row.owner, "alice");
    assert_eq!(row.sender, "alice");
    assert_eq!(row.created_at, PR_CREATED_UNIX);
    assert_eq!(row.updated_at, PR_UPDATED_UNIX);
}

#[tokio::test]
async fn test_redelivered_open_collapses_to_one_row() {
    let server = MockServer::start().await;
    let test = context(&server);

    for _ in 0..3 {
        let event = pull_request_event(
            "opened",
            pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
            actor(7, "alice"),
        );
        handle(&test.ctx, event).await.expect("handling should succeed");
    }

    assert_eq!(test.sink.events().len(), 1);
    let repos = test.repositories().await;
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert_eq!(item.contributor_ids, vec![7]);
}

#[tokio::test]
async fn test_merged_close_emits_pr_merged_and_marks_the_item() {
    let server = MockServer::start().await;
    let test = context(&server);
    let event = pull_request_event(
        "closed",
        merged(pull_request_json(901, 42, "Add retries", &actor(7, "alice"))),
        actor(7, "alice"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    let repos = test.repositories().await;
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert!(item.merged);
    assert!(item.closed_at.is_some());

    let events = test.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AnalyticsAction::PrMerged);
    assert_eq!(events[0].dedup_id, "holdex/tracker@901_pr_merged");
}

#[tokio::test]
async fn test_unmerged_close_emits_pr_closed() {
    let server = MockServer::start().await;
    let test = context(&server);
    let mut closed = pull_request_json(901, 42, "Add retries", &actor(7, "alice"));
    closed["state"] = json!("closed");
    closed["closed_at"] = json!(harness::PR_UPDATED_AT);
    let event = pull_request_event("closed", closed, actor(7, "alice"));

    handle(&test.ctx, event).await.expect("handling should succeed");

    let repos = test.repositories().await;
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert!(!item.merged);
    assert!(item.closed_at.is_some());
    assert_eq!(test.sink.actions(), vec![AnalyticsAction::PrClosed]);
}

#[tokio::test]
async fn test_merged_state_survives_a_stale_redelivery() {
    let server = MockServer::start().await;
    let test = context(&server);
    let event = pull_request_event(
        "closed",
        merged(pull_request_json(901, 42, "Add retries", &actor(7, "alice"))),
        actor(7, "alice"),
    );
    handle(&test.ctx, event).await.expect("close should succeed");

    // A stale synchronize still carries merged=false; the stored flag must
    // not regress.
    let event = pull_request_event(
        "synchronize",
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(7, "alice"),
    );
    handle(&test.ctx, event).await.expect("redelivery should succeed");

    let repos = test.repositories().await;
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert!(item.merged);
    assert_eq!(test.sink.actions(), vec![AnalyticsAction::PrMerged]);
}

#[tokio::test]
async fn test_reopened_clears_the_recorded_close() {
    let server = MockServer::start().await;
    let test = context(&server);
    let mut closed = pull_request_json(901, 42, "Add retries", &actor(7, "alice"));
    closed["state"] = json!("closed");
    closed["closed_at"] = json!(harness::PR_UPDATED_AT);
    let event = pull_request_event("closed", closed, actor(7, "alice"));
    handle(&test.ctx, event).await.expect("close should succeed");

    let event = pull_request_event(
        "reopened",
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(7, "alice"),
    );
    handle(&test.ctx, event).await.expect("reopen should succeed");

    let repos = test.repositories().await;
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert!(item.closed_at.is_none());
    // Reopening is not a lifecycle row of its own.
    assert_eq!(test.sink.actions(), vec![AnalyticsAction::PrClosed]);
}

// ============================================================================
// Actor attribution
// ============================================================================

#[tokio::test]
async fn test_edits_are_attributed_to_the_sender() {
    let server = MockServer::start().await;
    let test = context(&server);
    Mock::given(method("GET"))
        .and(path(format!(
            "/repos/{ORG}/{REPO}/commits/{HEAD_SHA}/check-runs"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"check_runs": []})))
        .expect(0)
        .mount(&server)
        .await;
    let mut event = pull_request_event_json(
        "edited",
        pull_request_json(901, 42, "fix: handle retries", &actor(7, "alice")),
        actor(8, "bob"),
    );
    event["changes"] = json!({"body": {"from": "old description"}});
    let event: PullRequestEvent = from_value(event);

    handle(&test.ctx, event).await.expect("handling should succeed");

    let repos = test.repositories().await;
    let editor = repos
        .contributors
        .get_by_id(8)
        .await
        .unwrap()
        .expect("editor should be persisted");
    assert_eq!(editor.login, "bob");
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert_eq!(item.contributor_ids, vec![8]);
    // A body-only edit never re-evaluates the fix policy; the mounted
    // check-runs listing stays untouched.
}

#[tokio::test]
async fn test_pushes_join_the_contributor_list() {
    let server = MockServer::start().await;
    let test = context(&server);
    let event = pull_request_event(
        "opened",
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(7, "alice"),
    );
    handle(&test.ctx, event).await.expect("open should succeed");

    let event = pull_request_event(
        "synchronize",
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(8, "bob"),
    );
    handle(&test.ctx, event).await.expect("push should succeed");

    let repos = test.repositories().await;
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert_eq!(item.contributor_ids, vec![7, 8]);
}

// ============================================================================
// Submission check fan-out
// ============================================================================

#[tokio::test]
async fn test_review_request_fans_out_submission_checks() {
    let server = MockServer::start().await;
    let test = context(&server);
    harness::mount_check_runs(&server, vec![]).await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{ORG}/{REPO}/check-runs")))
        .and(body_partial_json(json!({"name": "Cost Submission (alice)"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(check_run_json(31, "Cost Submission (alice)", &[42])),
        )
        .expect(1)
        .mount(&server)
        .await;
    let mut pr = pull_request_json(901, 42, "Add retries", &actor(7, "alice"));
    pr["requested_reviewers"] = json!([actor(9, "dave")]);
    let event = pull_request_event("review_requested", pr, actor(3, "erin"));

    handle(&test.ctx, event).await.expect("handling should succeed");
}

#[tokio::test]
async fn test_push_without_pending_reviewers_skips_the_fan_out() {
    let server = MockServer::start().await;
    let test = context(&server);
    Mock::given(method("GET"))
        .and(path(format!(
            "/repos/{ORG}/{REPO}/commits/{HEAD_SHA}/check-runs"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"check_runs": []})))
        .expect(0)
        .mount(&server)
        .await;
    let event = pull_request_event(
        "synchronize",
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(7, "alice"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");
}

#[tokio::test]
async fn test_push_with_pending_reviewers_fans_out() {
    let server = MockServer::start().await;
    let test = context(&server);
    harness::mount_check_runs(&server, vec![]).await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{ORG}/{REPO}/check-runs")))
        .and(body_partial_json(json!({"name": "Cost Submission (alice)"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(check_run_json(31, "Cost Submission (alice)", &[42])),
        )
        .expect(1)
        .mount(&server)
        .await;
    let mut pr = pull_request_json(901, 42, "Add retries", &actor(7, "alice"));
    pr["requested_reviewers"] = json!([actor(9, "dave")]);
    let event = pull_request_event("synchronize", pr, actor(7, "alice"));

    handle(&test.ctx, event).await.expect("handling should succeed");
}

// ============================================================================
// Fix policy escalation
// ============================================================================

#[tokio::test]
async fn test_retitle_to_fix_creates_the_bug_check() {
    let server = MockServer::start().await;
    let test = context(&server);
    harness::mount_check_runs(&server, vec![]).await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{ORG}/{REPO}/check-runs")))
        .and(body_partial_json(json!({"name": "Bug Report Info (alice)"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(check_run_json(31, "Bug Report Info (alice)", &[42])),
        )
        .expect(1)
        .mount(&server)
        .await;
    let mut event = pull_request_event_json(
        "edited",
        pull_request_json(901, 42, "fix: handle retries", &actor(7, "alice")),
        actor(7, "alice"),
    );
    event["changes"] = json!({"title": {"from": "Add retries"}});
    let event: PullRequestEvent = from_value(event);

    handle(&test.ctx, event).await.expect("handling should succeed");
}

// ============================================================================
// Skips
// ============================================================================

#[tokio::test]
async fn test_excluded_author_is_ignored() {
    let server = MockServer::start().await;
    let test = context(&server);
    let event = pull_request_event(
        "opened",
        pull_request_json(901, 42, "Bump lockfile", &actor(2, "dependabot[bot]")),
        actor(2, "dependabot[bot]"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    let repos = test.repositories().await;
    assert!(repos.items.get_by_id(901).await.unwrap().is_none());
    assert!(test.sink.events().is_empty());
}

#[tokio::test]
async fn test_unrelated_actions_are_ignored() {
    let server = MockServer::start().await;
    let test = context(&server);
    let event = pull_request_event(
        "labeled",
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(7, "alice"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    let repos = test.repositories().await;
    assert!(repos.items.get_by_id(901).await.unwrap().is_none());
    assert!(repos.contributors.get_by_id(7).await.unwrap().is_none());
    assert!(test.sink.events().is_empty());
}
