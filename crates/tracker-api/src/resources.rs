//! Item and contributor read endpoints.
//!
//! Read-only projections for the invoicing dashboard: merged items to
//! invoice, distinct field values for its filter dropdowns and the
//! contributor roster.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::Value;

use tracker_core::repositories::{CONTRIBUTOR_QUERY_FIELDS, ITEM_QUERY_FIELDS};

use crate::error::ApiError;
use crate::submissions::{caller_identity, parse_query};
use crate::{success, AppState};

/// `GET /api/items`: filtered listing, merged items unless asked otherwise.
pub(crate) async fn list_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    caller_identity(&state, &headers).await?;
    let repos = state.repositories().await?;

    let mut query = parse_query(&params, ITEM_QUERY_FIELDS)?;

    // A contributor filter matches membership in the item's contributor id
    // set, which the scalar field allow-list cannot express.
    if let Some(raw) = params.get("contributor_id") {
        let id: u64 = raw.parse().map_err(|_| {
            ApiError::validation(format!(
                "contributor_id must be a numeric GitHub id, got {raw:?}"
            ))
        })?;
        query.filter.insert("contributor_ids".to_string(), id.into());
    }

    Ok(success(repos.items.get_many(&query).await?))
}

/// `GET /api/contributors`: the roster, or distinct item field values when
/// asked with `?field=`.
pub(crate) async fn list_contributors(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    caller_identity(&state, &headers).await?;
    let repos = state.repositories().await?;

    if let Some(field) = params.get("field") {
        return Ok(success(repos.items.distinct_field(field).await?));
    }

    let query = parse_query(&params, CONTRIBUTOR_QUERY_FIELDS)?;
    Ok(success(repos.contributors.get_many(&query).await?))
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
