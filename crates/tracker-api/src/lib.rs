//! # Tracker HTTP Service
//!
//! HTTP surface of the PR time tracker GitHub App: the webhook ingress,
//! the REST endpoints the invoicing dashboard consumes, the check-run
//! trigger handoff and the health probe.
//!
//! This library provides:
//! - Webhook endpoint with signature verification and ack-then-spawn
//!   job dispatch
//! - Submission, item and contributor endpoints
//! - Secret-guarded check-run re-evaluation endpoint
//! - Health endpoint probing the document store
//!
//! Handlers stay thin: they authenticate the caller, validate the request
//! and delegate to [`tracker_core`]. Everything that mutates tracked state
//! in response to a webhook runs after the delivery is acknowledged, so
//! GitHub never waits on reconciliation.

pub mod error;

mod resources;
mod submissions;
mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use doc_store::StoreGateway;
use github_app_sdk::{SignatureValidator, WebhookEvent};
use tracker_core::jobs;
use tracker_core::repositories::Repositories;
use tracker_core::{JobContext, TrackerConfig};

pub use error::{ApiError, ServiceError};

/// Header the dashboard forwards the signed-in contributor's GitHub id in.
pub const CONTRIBUTOR_ID_HEADER: &str = "x-contributor-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Job-layer dependencies, shared with spawned reconciliation work
    pub ctx: JobContext,

    /// Store gateway, probed by the health endpoint
    pub store: Arc<StoreGateway>,

    /// Webhook signature validator
    pub validator: SignatureValidator,

    /// Secret expected on check-run trigger requests
    trigger_secret: String,
}

impl AppState {
    /// Create new application state
    pub fn new(
        ctx: JobContext,
        store: Arc<StoreGateway>,
        validator: SignatureValidator,
        trigger_secret: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            store,
            validator,
            trigger_secret: trigger_secret.into(),
        }
    }

    /// Repositories over a freshly acquired store handle.
    pub(crate) async fn repositories(&self) -> Result<Repositories, ApiError> {
        Ok(self.ctx.repositories().await?)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Service configuration
///
/// The server section is deployment plumbing; everything else is the
/// domain configuration shared with the job layer ([`TrackerConfig`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Domain configuration shared with the job layer
    #[serde(flatten)]
    pub tracker: TrackerConfig,
}

impl ServiceConfig {
    /// Validate the embedded domain configuration.
    pub fn validate(&self) -> Result<(), tracker_core::ConfigError> {
        self.tracker.validate()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route("/api/webhooks/github", post(handle_webhook));

    let api_routes = Router::new()
        .route(
            "/api/submissions",
            get(submissions::list_submissions)
                .post(submissions::create_submission)
                .patch(submissions::update_submission),
        )
        .route("/api/items", get(resources::list_items))
        .route("/api/contributors", get(resources::list_contributors))
        .route("/api/trigger/check-run", post(trigger::trigger_check_run));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    Router::new()
        .merge(webhook_routes)
        .merge(api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server with graceful shutdown
pub async fn start_server(config: ServiceConfig, state: AppState) -> Result<(), ServiceError> {
    let app = create_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT, initiating graceful shutdown");
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown");
            },
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle a GitHub webhook delivery.
///
/// The signature is verified against the raw body before anything is
/// parsed. Valid deliveries are acknowledged immediately and the matching
/// reconciliation job runs afterwards, keeping the response well inside
/// GitHub's delivery timeout; job failures land in the logs and heal on
/// the next delivery for the same resources.
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = header_str(&headers, "x-hub-signature-256")
        .ok_or_else(|| ApiError::validation("missing X-Hub-Signature-256 header"))?;

    let valid = state
        .validator
        .validate(&body, signature)
        .await
        .map_err(|e| ApiError::validation(format!("signature verification failed: {e}")))?;
    if !valid {
        return Err(ApiError::validation("webhook signature mismatch"));
    }

    let event_name = header_str(&headers, "x-github-event")
        .ok_or_else(|| ApiError::validation("missing X-GitHub-Event header"))?;
    let delivery_id = header_str(&headers, "x-github-delivery")
        .ok_or_else(|| ApiError::validation("missing X-GitHub-Delivery header"))?
        .to_string();

    let event = WebhookEvent::parse(event_name, &body)
        .map_err(|e| ApiError::validation(format!("malformed {event_name} payload: {e}")))?;

    info!(
        delivery_id = %delivery_id,
        event = event.event_name(),
        "Accepted webhook delivery"
    );

    let ctx = state.ctx.clone();
    let delivery = delivery_id.clone();
    tokio::spawn(async move {
        if let Err(error) = jobs::dispatch(&ctx, event).await {
            warn!(delivery_id = %delivery, error = %error, "Webhook job failed");
        }
    });

    Ok(success(json!({
        "delivery_id": delivery_id,
        "status": "queued",
    })))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// Health Check Handler
// ============================================================================

/// Liveness plus a bounded store ping.
///
/// A failed ping drops the cached store handle, so the next acquisition
/// reconnects instead of re-failing on the same dead connection.
async fn handle_health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let handle = match state.store.acquire().await {
        Ok(handle) => handle,
        Err(error) => {
            warn!(error = %error, "Health check could not acquire a store handle");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    let budget = state
        .store
        .config()
        .ping_timeout
        .to_std()
        .unwrap_or(Duration::from_secs(2));

    let failure = match tokio::time::timeout(budget, handle.ping()).await {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error.to_string()),
        Err(_) => Some(format!("ping timed out after {}ms", budget.as_millis())),
    };

    if let Some(reason) = failure {
        warn!(reason = %reason, "Health check store ping failed");
        if let Err(error) = state.store.invalidate(&handle) {
            warn!(error = %error, "Failed to drop unhealthy store handle");
        }
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        store: format!("{:?}", handle.provider_type()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

// ============================================================================
// Middleware
// ============================================================================

/// Correlate and log every request.
///
/// Reuses the caller's `x-correlation-id` when present, otherwise mints
/// one, and echoes it on the response so log lines can be joined across
/// services.
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        "Request started"
    );

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert("x-correlation-id", value);
    }

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed"
        );
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub store: String,
    pub version: String,
}

/// Success envelope every REST endpoint answers with.
pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "message": "success",
        "data": data,
    }))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
