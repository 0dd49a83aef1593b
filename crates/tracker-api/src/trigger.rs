//! Check-run re-evaluation endpoint.
//!
//! The receiving half of the trigger handoff: jobs and the submission
//! endpoints POST here instead of re-driving an existing check run in
//! place. The shared secret keeps the endpoint private to the deployment.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use tracker_core::jobs::check_run;
use tracker_core::trigger::TRIGGER_SECRET_HEADER;
use tracker_core::CheckRunTrigger;

use crate::error::ApiError;
use crate::{success, AppState};

/// `POST /api/trigger/check-run`: accept a re-evaluation request and run
/// it after acknowledging.
pub(crate) async fn trigger_check_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(trigger): Json<CheckRunTrigger>,
) -> Result<Json<Value>, ApiError> {
    let secret = headers
        .get(TRIGGER_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized(format!("missing {TRIGGER_SECRET_HEADER} header"))
        })?;
    if secret != state.trigger_secret {
        return Err(ApiError::unauthorized("trigger secret mismatch"));
    }

    info!(
        kind = ?trigger.kind,
        org = %trigger.organization,
        repo = %trigger.repo,
        pr_number = trigger.pr_number,
        login = %trigger.sender_login,
        "Accepted check-run trigger"
    );

    let ctx = state.ctx.clone();
    tokio::spawn(async move {
        if let Err(error) = check_run::handle_trigger(&ctx, trigger).await {
            warn!(error = %error, "Check-run re-evaluation failed");
        }
    });

    Ok(success(json!({ "status": "queued" })))
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
