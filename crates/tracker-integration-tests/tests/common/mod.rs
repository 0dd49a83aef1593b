//! Shared harness for cross-crate tests.
//!
//! Wires the real router, job layer and in-memory store together the way
//! the service binary does, with GitHub and the trigger endpoint standing
//! behind a wiremock server. Webhook jobs detach from the request that
//! acknowledged them, so the wait helpers poll the store and the sink for
//! their effects.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;
use wiremock::MockServer;

use doc_store::{StoreClientFactory, StoreGateway};
use github_app_sdk::auth::{
    AuthenticationProvider, GitHubAppId, Installation, InstallationId, InstallationPermissions,
    InstallationToken, JsonWebToken, RepositorySelection, StaticSecretProvider, User, UserId,
    UserType,
};
use github_app_sdk::client::ClientConfig;
use github_app_sdk::error::AuthError;
use github_app_sdk::{GitHubClient, SignatureValidator};
use tracker_api::{create_router, AppState, CONTRIBUTOR_ID_HEADER};
use tracker_core::analytics::{AnalyticsAction, MemorySink};
use tracker_core::entities::{Contributor, Item, UserRole};
use tracker_core::jobs::{JobContext, JobSettings};
use tracker_core::repositories::{Repositories, CONTRIBUTORS_COLLECTION};
use tracker_core::trigger::TriggerClient;

pub const ORG: &str = "holdex";
pub const REPO: &str = "tracker";
pub const WEBHOOK_SECRET: &str = "webhook-secret";
pub const TRIGGER_SECRET: &str = "trigger-secret";
pub const INSTALLATION_ID: u64 = 12345;
pub const HEAD_SHA: &str = "7f3a9c1d2e4b";

pub const PR_CREATED_AT: &str = "2024-03-01T10:00:00Z";
pub const PR_UPDATED_AT: &str = "2024-03-02T11:30:00Z";

// ----------------------------------------------------------------------------
// Auth stub
// ----------------------------------------------------------------------------

/// Answers every auth lookup from fixed data, so tests need no token or
/// installation endpoints on the mock server.
#[derive(Clone)]
pub struct StubAuthProvider;

#[async_trait::async_trait]
impl AuthenticationProvider for StubAuthProvider {
    async fn generate_jwt(&self) -> Result<JsonWebToken, AuthError> {
        Ok(JsonWebToken::new(
            "test.jwt.token".to_string(),
            GitHubAppId::new(1),
            Utc::now() + chrono::Duration::minutes(10),
        ))
    }

    async fn get_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        Ok(InstallationToken::new(
            "ghs_test_token".to_string(),
            installation_id,
            Utc::now() + chrono::Duration::hours(1),
            InstallationPermissions::default(),
            Vec::new(),
        ))
    }

    async fn refresh_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        self.get_installation_token(installation_id).await
    }

    async fn get_org_installation(&self, org: &str) -> Result<Installation, AuthError> {
        Ok(Installation {
            id: InstallationId::new(INSTALLATION_ID),
            account: User {
                id: UserId::new(1),
                login: org.to_string(),
                user_type: UserType::Organization,
                avatar_url: None,
                html_url: format!("https://github.com/{org}"),
            },
            repository_selection: RepositorySelection::All,
            permissions: InstallationPermissions::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            suspended_at: None,
        })
    }
}

// ----------------------------------------------------------------------------
// Service wiring
// ----------------------------------------------------------------------------

pub struct Harness {
    pub state: AppState,
    pub sink: Arc<MemorySink>,
    pub store: Arc<StoreGateway>,
}

/// The full service over an in-memory store, with GitHub and the trigger
/// endpoint pointed at the mock server and all debounce waits removed.
pub fn harness(server: &MockServer) -> Harness {
    let config = ClientConfig {
        github_api_url: server.uri(),
        initial_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(10),
        ..ClientConfig::default()
    };
    let github = GitHubClient::builder(Arc::new(StubAuthProvider))
        .config(config)
        .build()
        .expect("client should build");

    let sink = Arc::new(MemorySink::new());
    let trigger = TriggerClient::new(reqwest::Client::new(), server.uri(), TRIGGER_SECRET);
    let store = Arc::new(StoreClientFactory::create_test_gateway());
    let ctx = JobContext::new(
        Arc::clone(&store),
        github,
        sink.clone(),
        trigger,
        JobSettings::immediate(),
    );

    let secrets = StaticSecretProvider::new(GitHubAppId::new(1), "", WEBHOOK_SECRET);
    let validator = SignatureValidator::new(Arc::new(secrets));

    Harness {
        state: AppState::new(ctx, Arc::clone(&store), validator, TRIGGER_SECRET),
        sink,
        store,
    }
}

impl Harness {
    pub async fn repositories(&self) -> Repositories {
        self.state
            .ctx
            .repositories()
            .await
            .expect("test store should acquire")
    }

    /// Drive one request through a fresh router over this state.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("router should answer");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should collect");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, body)
    }
}

// ----------------------------------------------------------------------------
// Request builders
// ----------------------------------------------------------------------------

pub fn get(uri: &str, caller: Option<u64>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(id) = caller {
        builder = builder.header(CONTRIBUTOR_ID_HEADER, id.to_string());
    }
    builder.body(Body::empty()).expect("request should build")
}

pub fn json_request(method: &str, uri: &str, caller: Option<u64>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = caller {
        builder = builder.header(CONTRIBUTOR_ID_HEADER, id.to_string());
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

/// A signed webhook delivery. Redelivery tests reuse the delivery id;
/// everything else should mint a fresh one.
pub fn webhook_request(event: &str, delivery: &str, payload: &Value) -> Request<Body> {
    let body = payload.to_string();
    let signature = sign(body.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-github-delivery", delivery)
        .header("x-hub-signature-256", signature)
        .body(Body::from(body))
        .expect("request should build")
}

/// `sha256=<hex>` signature over a payload under the test webhook secret.
pub fn sign(payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("any key length works");
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

// ----------------------------------------------------------------------------
// Store seeding
// ----------------------------------------------------------------------------

pub fn contributor(id: u64, login: &str, role: UserRole, rate: Option<f64>) -> Contributor {
    Contributor {
        id,
        login: login.to_string(),
        name: login.to_string(),
        url: format!("https://github.com/{login}"),
        avatar_url: format!("https://avatars.githubusercontent.com/u/{id}"),
        role,
        rate,
        created_at: None,
        updated_at: None,
    }
}

/// Insert a contributor exactly as given. The webhook upsert path never
/// assigns manager roles or rates, so tests place those directly.
pub async fn seed_contributor(harness: &Harness, contributor: &Contributor) {
    let handle = harness.store.acquire().await.expect("store should acquire");
    handle
        .collection::<Contributor>(CONTRIBUTORS_COLLECTION)
        .insert_one(contributor)
        .await
        .expect("contributor should insert");
}

// ----------------------------------------------------------------------------
// GitHub payload builders
// ----------------------------------------------------------------------------

pub fn actor(id: u64, login: &str) -> Value {
    json!({
        "id": id,
        "login": login,
        "type": if login.ends_with("[bot]") { "Bot" } else { "User" },
        "html_url": format!("https://github.com/{login}"),
        "avatar_url": format!("https://avatars.githubusercontent.com/u/{id}")
    })
}

pub fn repository_json() -> Value {
    json!({
        "id": 500,
        "name": REPO,
        "full_name": format!("{ORG}/{REPO}"),
        "owner": {
            "id": 42,
            "login": ORG,
            "type": "Organization",
            "html_url": format!("https://github.com/{ORG}"),
            "avatar_url": null
        },
        "private": true,
        "html_url": format!("https://github.com/{ORG}/{REPO}")
    })
}

pub fn organization_json() -> Value {
    json!({"id": 9001, "login": ORG})
}

pub fn pull_request_json(id: u64, number: u64, title: &str, author: &Value) -> Value {
    json!({
        "id": id,
        "node_id": format!("PR_{id}"),
        "number": number,
        "title": title,
        "body": null,
        "state": "open",
        "user": author,
        "head": {"ref": "feature/tracking", "sha": HEAD_SHA},
        "base": {"ref": "main", "sha": "000111222333"},
        "draft": false,
        "requested_reviewers": [],
        "requested_teams": [],
        "merged": false,
        "created_at": PR_CREATED_AT,
        "updated_at": PR_UPDATED_AT,
        "closed_at": null,
        "merged_at": null,
        "html_url": format!("https://github.com/{ORG}/{REPO}/pull/{number}")
    })
}

/// Flip a pull request fixture to the merged state.
pub fn merged(mut pull_request: Value) -> Value {
    pull_request["state"] = json!("closed");
    pull_request["merged"] = json!(true);
    pull_request["merged_at"] = json!(PR_UPDATED_AT);
    pull_request["closed_at"] = json!(PR_UPDATED_AT);
    pull_request
}

pub fn pull_request_event_json(action: &str, pull_request: Value, sender: Value) -> Value {
    let number = pull_request["number"].as_u64().unwrap_or(0);
    json!({
        "action": action,
        "number": number,
        "pull_request": pull_request,
        "repository": repository_json(),
        "organization": organization_json(),
        "installation": {"id": INSTALLATION_ID},
        "sender": sender
    })
}

// ----------------------------------------------------------------------------
// Wait helpers
// ----------------------------------------------------------------------------

/// Wait for the item a detached webhook job writes.
pub async fn wait_for_item(repos: &Repositories, id: u64) -> Item {
    for _ in 0..200 {
        if let Some(item) = repos.items.get_by_id(id).await.expect("store should answer") {
            return item;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("item {id} never appeared in the store");
}

/// Wait until the stored item has recorded its merge.
pub async fn wait_for_merged_item(repos: &Repositories, id: u64) -> Item {
    for _ in 0..200 {
        match repos.items.get_by_id(id).await.expect("store should answer") {
            Some(item) if item.merged => return item,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    panic!("item {id} never recorded its merge");
}

/// Wait until the sink holds at least `count` rows, then return their
/// actions in insertion order.
pub async fn wait_for_actions(sink: &MemorySink, count: usize) -> Vec<AnalyticsAction> {
    for _ in 0..200 {
        let actions = sink.actions();
        if actions.len() >= count {
            return actions;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "sink never reached {count} rows, last saw {:?}",
        sink.actions()
    );
}
