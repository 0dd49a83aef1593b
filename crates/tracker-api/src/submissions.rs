//! Submission endpoints.
//!
//! Submissions are the one collection written by people rather than by
//! webhook jobs. Callers are identified by the contributor id the
//! dashboard forwards after its own sign-in; creating a claim is
//! self-service, amending someone else's is a manager action. Changes are
//! recorded as analytics rows and hand the claimant's cost-submission
//! check run a re-evaluation.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use doc_store::{ParsedQuery, StoreError};
use tracker_core::analytics::{now_unix_seconds, submission_event_id, unix_seconds};
use tracker_core::repositories::SUBMISSION_QUERY_FIELDS;
use tracker_core::{
    AnalyticsAction, AnalyticsEvent, Approval, CheckRunKind, CheckRunTrigger, Contributor,
    Experience, Item, JobError, Submission, UserRole,
};

use crate::error::ApiError;
use crate::{success, AppState, CONTRIBUTOR_ID_HEADER};

// ============================================================================
// Caller identity
// ============================================================================

/// Resolve the calling contributor from the forwarded id header.
///
/// The dashboard authenticates users upstream and forwards the numeric
/// GitHub id of whoever is signed in; ids that do not resolve to a known
/// contributor are rejected.
pub(crate) async fn caller_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Contributor, ApiError> {
    let raw = headers
        .get(CONTRIBUTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized(format!("missing {CONTRIBUTOR_ID_HEADER} header")))?;

    let id: u64 = raw.parse().map_err(|_| {
        ApiError::unauthorized(format!("{CONTRIBUTOR_ID_HEADER} must be a numeric GitHub id"))
    })?;

    let repos = state.repositories().await?;
    repos
        .contributors
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::unauthorized(format!("contributor {id} is not known")))
}

// ============================================================================
// Listing
// ============================================================================

/// `GET /api/submissions`: one submission by id, or a filtered listing.
pub(crate) async fn list_submissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    caller_identity(&state, &headers).await?;
    let repos = state.repositories().await?;

    // Unknown ids answer with a null payload rather than an error; the
    // dashboard probes for claims that may not exist yet.
    if let Some(id) = params.get("id") {
        return Ok(success(repos.submissions.get_by_id(id).await?));
    }

    let query = parse_query(&params, SUBMISSION_QUERY_FIELDS)?;
    Ok(success(repos.submissions.get_many(&query).await?))
}

pub(crate) fn parse_query(
    params: &HashMap<String, String>,
    allowed_fields: &[&str],
) -> Result<ParsedQuery, ApiError> {
    ParsedQuery::from_params(
        params.iter().map(|(key, value)| (key.as_str(), value.as_str())),
        allowed_fields,
    )
    .map_err(|e| ApiError::validation(e.to_string()))
}

// ============================================================================
// Creation
// ============================================================================

/// Body of `POST /api/submissions`.
#[derive(Debug, Deserialize)]
pub(crate) struct CreateSubmissionRequest {
    pub item_id: u64,
    pub owner_id: u64,
    #[serde(deserialize_with = "hours_string")]
    pub hours: String,
    pub experience: Experience,
}

/// `POST /api/submissions`: record the caller's claim of hours spent on an
/// item.
///
/// The claim starts pending, is priced with the caller's current rate and
/// is unique per contributor and item. When the item is already tracked
/// the claim is linked to it, recorded as an analytics row and the
/// caller's cost-submission check run is re-evaluated; a claim against an
/// item no webhook has reported yet is stored bare and picks up its side
/// effects once the item exists.
pub(crate) async fn create_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSubmissionRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = caller_identity(&state, &headers).await?;
    if request.owner_id != caller.id {
        return Err(ApiError::forbidden(
            "submissions can only be created for the calling contributor",
        ));
    }

    let repos = state.repositories().await?;
    let item = repos.items.get_by_id(request.item_id).await?;

    let submission = Submission {
        id: Uuid::new_v4().to_string(),
        item_id: request.item_id,
        owner_id: caller.id,
        hours: request.hours,
        experience: request.experience,
        approval: Approval::Pending,
        rate: caller.rate,
        created_at: None,
        updated_at: None,
    };

    let created = match repos.submissions.create(submission).await {
        Ok(created) => created,
        Err(JobError::Store(StoreError::DuplicateKey { .. })) => {
            return Err(ApiError::conflict(format!(
                "contributor {} already has a submission for item {}",
                caller.id, request.item_id
            )));
        }
        Err(error) => return Err(error.into()),
    };

    if let Some(item) = &item {
        repos.items.attach_submission(item.id, &created.id).await?;
        record_transition(&state, item, &created, &caller.login, AnalyticsAction::PrSubmissionCreated)
            .await?;
        request_check_run(&state, item, &caller).await?;
    }

    Ok(success(created))
}

// ============================================================================
// Amendment
// ============================================================================

/// Body of `PATCH /api/submissions`.
///
/// Only the reviewable fields are patchable; the claim's identity, its
/// item and its owner, is fixed at creation.
#[derive(Debug, Deserialize)]
pub(crate) struct UpdateSubmissionRequest {
    pub id: String,
    #[serde(default, deserialize_with = "opt_hours_string")]
    pub hours: Option<String>,
    #[serde(default)]
    pub approval: Option<Approval>,
    #[serde(default)]
    pub experience: Option<Experience>,
}

/// `PATCH /api/submissions`: amend hours, experience or approval.
///
/// Contributors may amend their own claims; managers may amend anyone's,
/// and a manager's change is recorded as an approval transition rather
/// than a re-creation. Sending the claim back to pending re-evaluates the
/// claimant's cost-submission check run.
pub(crate) async fn update_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateSubmissionRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = caller_identity(&state, &headers).await?;
    let repos = state.repositories().await?;

    let existing = repos
        .submissions
        .get_by_id(&request.id)
        .await?
        .ok_or_else(|| ApiError::validation(format!("submission {:?} is not known", request.id)))?;

    if caller.role != UserRole::Manager && existing.owner_id != caller.id {
        return Err(ApiError::forbidden(
            "only managers may amend another contributor's submission",
        ));
    }

    let mut set = Map::new();
    if let Some(hours) = &request.hours {
        let candidate = Submission {
            hours: hours.clone(),
            ..existing.clone()
        };
        candidate.validate()?;
        set.insert("hours".to_string(), hours.clone().into());
    }
    if let Some(approval) = request.approval {
        set.insert("approval".to_string(), json!(approval));
    }
    if let Some(experience) = request.experience {
        set.insert("experience".to_string(), json!(experience));
    }
    if set.is_empty() {
        return Err(ApiError::validation("no patchable fields in request"));
    }

    let updated = repos.submissions.update(&existing.id, set).await?;

    if let Some(item) = repos.items.get_by_id(existing.item_id).await? {
        repos.items.touch(item.id).await?;

        let action = if caller.role == UserRole::Manager {
            AnalyticsAction::PrSubmissionApproved
        } else {
            AnalyticsAction::PrSubmissionCreated
        };
        record_transition(&state, &item, &updated, &caller.login, action).await?;

        // Back to pending means the claim needs another look; the check run
        // belongs to the claimant, not to whoever patched.
        if request.approval == Some(Approval::Pending) {
            match repos.contributors.get_by_id(updated.owner_id).await? {
                Some(owner) => request_check_run(&state, &item, &owner).await?,
                None => warn!(
                    owner_id = updated.owner_id,
                    "Submission owner unknown, skipping check-run re-evaluation"
                ),
            }
        }
    }

    Ok(success(updated))
}

// ============================================================================
// Side effects
// ============================================================================

/// Append the analytics row for a submission transition.
///
/// The row id is salted with the claim's creation time, so edits of one
/// claim collapse per action while distinct claims stay distinct.
async fn record_transition(
    state: &AppState,
    item: &Item,
    submission: &Submission,
    sender: &str,
    action: AnalyticsAction,
) -> Result<(), ApiError> {
    let created_unix = submission
        .created_at
        .map(unix_seconds)
        .unwrap_or_else(now_unix_seconds);

    let event = AnalyticsEvent::new(
        submission_event_id(item.id, sender, &created_unix, action),
        action,
        item.id,
        &item.org,
        &item.repo,
        &item.title,
        &item.owner,
        sender,
    )
    .with_payload(submission.hours.clone())
    .with_timestamps(created_unix, now_unix_seconds());

    state.ctx.emit(event).await?;
    Ok(())
}

/// Hand the contributor's cost-submission check run a re-evaluation.
async fn request_check_run(
    state: &AppState,
    item: &Item,
    contributor: &Contributor,
) -> Result<(), ApiError> {
    state
        .ctx
        .trigger
        .request_check_run(&CheckRunTrigger {
            kind: CheckRunKind::Submission,
            organization: item.org.clone(),
            repo: item.repo.clone(),
            sender_login: contributor.login.clone(),
            sender_id: contributor.id,
            pr_number: item.number,
            pr_id: None,
            check_run_id: None,
        })
        .await?;
    Ok(())
}

// ============================================================================
// Body parsing
// ============================================================================

/// Accept hours as a JSON string or bare number; the dashboard has sent
/// both over time.
fn hours_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "hours must be a string or number, got {other}"
        ))),
    }
}

fn opt_hours_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    hours_string(deserializer).map(Some)
}

#[cfg(test)]
#[path = "submissions_tests.rs"]
mod tests;
