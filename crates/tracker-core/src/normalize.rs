//! Webhook payload normalizers.
//!
//! Events arrive unordered and possibly replayed, so normalization merges the
//! incoming payload with the stored record instead of overwriting it: flags
//! that are monotonic stay monotonic, lists only grow, and fields the payload
//! is not authoritative for keep their stored value.

use github_app_sdk::client::{Actor, PullRequest};
use github_app_sdk::events::{EventOrganization, EventRepository};

use crate::entities::{Contributor, Item, ItemType, UserRole};

/// Organization recorded when a payload carries none.
pub const DEFAULT_ORG: &str = "holdex";

/// Project a webhook actor onto the contributor document shape.
///
/// Webhook payloads carry no display name, so the login stands in for it.
/// The role is left at its default; role assignment happens once at creation
/// time in the repository layer and is never driven by webhook data.
pub fn normalize_contributor(actor: &Actor) -> Contributor {
    Contributor {
        id: actor.id,
        login: actor.login.clone(),
        name: actor.login.clone(),
        url: actor
            .html_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}", actor.login)),
        avatar_url: actor
            .avatar_url
            .clone()
            .unwrap_or_else(|| format!("https://avatars.githubusercontent.com/u/{}", actor.id)),
        role: UserRole::default(),
        rate: None,
        created_at: None,
        updated_at: None,
    }
}

/// Merge a pull request payload with the stored item.
///
/// Monotonic fields never move backwards: `merged` stays true once true,
/// `closed_at` keeps the first recorded close (an explicit reopen clears it
/// in the job layer), `contributor_ids` grows by set union and
/// `submission_ids` always comes from the stored record. Title and URL are
/// taken fresh from the payload since GitHub is authoritative for them.
pub fn normalize_pull_request(
    existing: Option<&Item>,
    pull_request: &PullRequest,
    repository: &EventRepository,
    organization: Option<&EventOrganization>,
    contributor: &Contributor,
) -> Item {
    let mut item = Item {
        id: pull_request.id,
        item_type: ItemType::PullRequest,
        org: organization
            .map(|org| org.login.clone())
            .unwrap_or_else(|| DEFAULT_ORG.to_string()),
        repo: repository.name.clone(),
        owner: pull_request.user.login.clone(),
        title: pull_request.title.clone(),
        number: existing.map(|item| item.number).unwrap_or(pull_request.number),
        url: pull_request.html_url.clone(),
        contributor_ids: existing
            .map(|item| item.contributor_ids.clone())
            .unwrap_or_default(),
        submission_ids: existing
            .map(|item| item.submission_ids.clone())
            .unwrap_or_default(),
        merged: existing.map(|item| item.merged).unwrap_or(false) || pull_request.is_merged(),
        closed_at: existing
            .and_then(|item| item.closed_at)
            .or(pull_request.closed_at),
        created_at: existing.and_then(|item| item.created_at),
        updated_at: existing.and_then(|item| item.updated_at),
    };
    item.add_contributor(contributor.id);
    item
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
