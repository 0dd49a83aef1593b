use super::*;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::MockServer;

use tracker_core::{Item, UserRole};

use crate::test_support::{contributor, get, item, seed_contributor, seed_item, state, TestState};

const ALICE: u64 = 7;

async fn seeded(server: &MockServer) -> TestState {
    let fixture = state(server);
    seed_contributor(
        &fixture,
        &contributor(ALICE, "alice", UserRole::Contributor, None),
    )
    .await;
    fixture
}

// ============================================================================
// Items
// ============================================================================

#[tokio::test]
async fn test_items_require_a_known_caller() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;

    let (status, _) = fixture.send(get("/api/items", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_items_list_merged_work_unless_asked_otherwise() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;
    seed_item(&fixture, &item(9001, 42, "Add retries", "alice")).await;
    seed_item(
        &fixture,
        &Item {
            merged: false,
            ..item(9002, 43, "Flaky draft", "alice")
        },
    )
    .await;

    let (status, body) = fixture.send(get("/api/items", Some(ALICE))).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(9001));

    let (status, body) = fixture.send(get("/api/items?merged=false", Some(ALICE))).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(9002));
}

#[tokio::test]
async fn test_items_filter_on_contributor_membership() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;
    seed_item(
        &fixture,
        &Item {
            contributor_ids: vec![ALICE, 31],
            ..item(9001, 42, "Add retries", "alice")
        },
    )
    .await;
    seed_item(
        &fixture,
        &Item {
            contributor_ids: vec![31],
            ..item(9002, 43, "Tune cache", "carol")
        },
    )
    .await;

    let (status, body) = fixture
        .send(get(&format!("/api/items?contributor_id={ALICE}"), Some(ALICE)))
        .await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(9001));
}

#[tokio::test]
async fn test_items_reject_non_numeric_contributor_filter() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;

    let (status, body) = fixture
        .send(get("/api/items?contributor_id=alice", Some(ALICE)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("contributor_id"));
}

// ============================================================================
// Contributors
// ============================================================================

#[tokio::test]
async fn test_contributors_roster_lists_everyone() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;
    seed_contributor(
        &fixture,
        &contributor(11, "morgan", UserRole::Manager, None),
    )
    .await;

    let (status, body) = fixture.send(get("/api/contributors", Some(ALICE))).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_contributors_filter_on_role() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;
    seed_contributor(
        &fixture,
        &contributor(11, "morgan", UserRole::Manager, None),
    )
    .await;

    let (status, body) = fixture
        .send(get("/api/contributors?role=manager", Some(ALICE)))
        .await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["login"], json!("morgan"));
}

#[tokio::test]
async fn test_contributors_field_mode_answers_distinct_item_values() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;
    seed_item(&fixture, &item(9001, 42, "Add retries", "alice")).await;
    seed_item(
        &fixture,
        &Item {
            repo: "dashboard".to_string(),
            ..item(9002, 43, "Tune cache", "alice")
        },
    )
    .await;
    seed_item(
        &fixture,
        &Item {
            repo: "dashboard".to_string(),
            ..item(9003, 44, "Fix login", "alice")
        },
    )
    .await;

    let (status, body) = fixture
        .send(get("/api/contributors?field=repo", Some(ALICE)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["tracker", "dashboard"]));
}

#[tokio::test]
async fn test_contributors_field_mode_rejects_unqueryable_fields() {
    let server = MockServer::start().await;
    let fixture = seeded(&server).await;

    let (status, body) = fixture
        .send(get("/api/contributors?field=rate", Some(ALICE)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("rate"));
}
