use super::*;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::comments::{body_with_marker, pull_request_marker, submit_hours_body};
use crate::jobs::tests::harness::{
    self, actor, check_run_json, comment_json, context, pull_request_json, review_event,
    review_json, BOT_LOGIN, ORG, PR_CREATED_UNIX, PR_UPDATED_UNIX, REPO, REVIEW_SUBMITTED_UNIX,
};

async fn mount_quiet_github(server: &MockServer) {
    harness::mount_comments(server, 42, vec![]).await;
    harness::mount_check_runs(server, vec![]).await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{ORG}/{REPO}/check-runs")))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(check_run_json(31, "Cost Submission (dave)", &[42])),
        )
        .mount(server)
        .await;
}

// ============================================================================
// Approval rows
// ============================================================================

#[tokio::test]
async fn test_approval_emits_reviewer_and_owner_rows() {
    let server = MockServer::start().await;
    let test = context(&server);
    mount_quiet_github(&server).await;
    let event = review_event(
        "submitted",
        review_json(1001, &actor(9, "dave"), "approved"),
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(9, "dave"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    let events = test.sink.events();
    assert_eq!(events.len(), 2);

    let reviewer_row = &events[0];
    assert_eq!(reviewer_row.action, AnalyticsAction::PrReviewApprove);
    assert_eq!(
        reviewer_row.dedup_id,
        format!("holdex/tracker@901_dave_{REVIEW_SUBMITTED_UNIX}_pr_review_approve")
    );
    assert_eq!(reviewer_row.owner, "dave");
    assert_eq!(reviewer_row.sender, "dave");
    assert_eq!(reviewer_row.created_at, PR_CREATED_UNIX);
    assert_eq!(reviewer_row.updated_at, PR_UPDATED_UNIX);

    let owner_row = &events[1];
    assert_eq!(owner_row.action, AnalyticsAction::PrApproved);
    assert_eq!(
        owner_row.dedup_id,
        format!("holdex/tracker@901_dave_{REVIEW_SUBMITTED_UNIX}_pr_approved")
    );
    assert_eq!(owner_row.owner, "alice");
    assert_eq!(owner_row.sender, "dave");
}

#[tokio::test]
async fn test_redelivered_approval_reuses_row_identities() {
    let server = MockServer::start().await;
    let test = context(&server);
    mount_quiet_github(&server).await;

    for _ in 0..2 {
        let event = review_event(
            "submitted",
            review_json(1001, &actor(9, "dave"), "approved"),
            pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
            actor(9, "dave"),
        );
        handle(&test.ctx, event).await.expect("handling should succeed");
    }

    assert_eq!(test.sink.events().len(), 2);
}

#[tokio::test]
async fn test_each_distinct_approval_gets_its_own_rows() {
    let server = MockServer::start().await;
    let test = context(&server);
    mount_quiet_github(&server).await;
    let event = review_event(
        "submitted",
        review_json(1001, &actor(9, "dave"), "approved"),
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(9, "dave"),
    );
    handle(&test.ctx, event).await.expect("first approval should succeed");

    let mut review = review_json(1002, &actor(9, "dave"), "approved");
    review["submitted_at"] = json!("2024-03-03T09:00:00Z");
    let event = review_event(
        "submitted",
        review,
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(9, "dave"),
    );
    handle(&test.ctx, event).await.expect("second approval should succeed");

    assert_eq!(test.sink.events().len(), 4);
}

#[tokio::test]
async fn test_commented_review_tracks_the_reviewer_without_rows() {
    let server = MockServer::start().await;
    let test = context(&server);
    mount_quiet_github(&server).await;
    let event = review_event(
        "submitted",
        review_json(1001, &actor(9, "dave"), "commented"),
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(9, "dave"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    assert!(test.sink.events().is_empty());
    let repos = test.repositories().await;
    let reviewer = repos
        .contributors
        .get_by_id(9)
        .await
        .unwrap()
        .expect("reviewer should be persisted");
    assert_eq!(reviewer.login, "dave");
    let item = repos.items.get_by_id(901).await.unwrap().unwrap();
    assert_eq!(item.contributor_ids, vec![9]);
}

// ============================================================================
// Thread upkeep
// ============================================================================

#[tokio::test]
async fn test_review_bumps_the_sticky_comment() {
    let server = MockServer::start().await;
    let test = context(&server);
    let repos = test.repositories().await;
    repos
        .contributors
        .upsert(harness::contributor(7, "alice"))
        .await
        .unwrap();
    let mut item = harness::item(901, 42, "Add retries");
    item.contributor_ids = vec![7];
    repos.items.upsert(item).await.unwrap();

    let marker = pull_request_marker(901);
    let body = body_with_marker(
        &submit_hours_body(&["alice".to_string()], "https://example.dev"),
        &marker,
    );
    harness::mount_comments(&server, 42, vec![comment_json(9, BOT_LOGIN, &body)]).await;
    Mock::given(method("DELETE"))
        .and(path(format!("/repos/{ORG}/{REPO}/issues/comments/9")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{ORG}/{REPO}/issues/42/comments")))
        .respond_with(harness::created_comment())
        .expect(1)
        .mount(&server)
        .await;
    harness::mount_check_runs(&server, vec![]).await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{ORG}/{REPO}/check-runs")))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(check_run_json(31, "Cost Submission (alice)", &[42])),
        )
        .mount(&server)
        .await;
    let event = review_event(
        "submitted",
        review_json(1001, &actor(9, "dave"), "commented"),
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(9, "dave"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");
}

// ============================================================================
// Skips
// ============================================================================

#[tokio::test]
async fn test_dismissed_review_is_ignored() {
    let server = MockServer::start().await;
    let test = context(&server);
    Mock::given(method("GET"))
        .and(path(format!("/repos/{ORG}/{REPO}/issues/42/comments")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    let event = review_event(
        "dismissed",
        review_json(1001, &actor(9, "dave"), "approved"),
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(9, "dave"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    assert!(test.sink.events().is_empty());
}

#[tokio::test]
async fn test_excluded_reviewer_is_skipped() {
    let server = MockServer::start().await;
    let test = context(&server);
    let event = review_event(
        "submitted",
        review_json(1001, &actor(4, "coderabbitai"), "approved"),
        pull_request_json(901, 42, "Add retries", &actor(7, "alice")),
        actor(4, "coderabbitai"),
    );

    handle(&test.ctx, event).await.expect("handling should succeed");

    assert!(test.sink.events().is_empty());
    let repos = test.repositories().await;
    assert!(repos.contributors.get_by_id(4).await.unwrap().is_none());
}
