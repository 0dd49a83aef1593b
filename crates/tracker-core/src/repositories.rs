//! Collection repositories.
//!
//! Typed CRUD facades over the four persistent collections. All writes go
//! through here so the timestamp stamping rules hold everywhere: `create`
//! sets `created_at = updated_at = now`, every update refreshes
//! `updated_at`, and every write is re-read before being returned so callers
//! observe store-derived fields.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::warn;

use doc_store::{Collection, ParsedQuery, SerializationError, StoreError, StoreHandle};

use crate::entities::{BugReport, Contributor, Item, Submission, UserRole};
use crate::error::JobError;

pub const CONTRIBUTORS_COLLECTION: &str = "contributors";
pub const ITEMS_COLLECTION: &str = "items";
pub const SUBMISSIONS_COLLECTION: &str = "submissions";
pub const BUG_REPORTS_COLLECTION: &str = "bug_reports";

/// Fields callers may filter contributors by.
pub const CONTRIBUTOR_QUERY_FIELDS: &[&str] = &["id", "login", "role"];

/// Fields callers may filter items by.
pub const ITEM_QUERY_FIELDS: &[&str] = &["id", "type", "org", "repo", "owner", "merged", "number"];

/// Fields callers may filter submissions by.
pub const SUBMISSION_QUERY_FIELDS: &[&str] = &["item_id", "owner_id", "approval", "experience"];

/// Fields callers may filter bug reports by.
pub const BUG_REPORT_QUERY_FIELDS: &[&str] = &["item_id", "bug_author_login", "reporter_login"];

/// Repositories over one acquired store handle.
///
/// Cheap to construct; jobs build a fresh one from the gateway per run so a
/// handle invalidation between jobs is picked up naturally.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub contributors: ContributorsRepo,
    pub items: ItemsRepo,
    pub submissions: SubmissionsRepo,
    pub bug_reports: BugReportsRepo,
}

impl Repositories {
    pub fn new(handle: &StoreHandle, bootstrap_manager_id: Option<u64>) -> Self {
        Self {
            contributors: ContributorsRepo {
                collection: handle.collection(CONTRIBUTORS_COLLECTION),
                bootstrap_manager_id,
            },
            items: ItemsRepo {
                collection: handle.collection(ITEMS_COLLECTION),
            },
            submissions: SubmissionsRepo {
                collection: handle.collection(SUBMISSIONS_COLLECTION),
            },
            bug_reports: BugReportsRepo {
                collection: handle.collection(BUG_REPORTS_COLLECTION),
            },
        }
    }

    /// Declare the uniqueness indexes each collection relies on.
    ///
    /// Index setup failures are logged and swallowed; the store may not
    /// support index management and the system degrades to best-effort
    /// uniqueness in that case.
    pub async fn ensure_indexes(&self) {
        if let Err(error) = self.contributors.collection.ensure_unique_index(&["id"]).await {
            warn!(collection = CONTRIBUTORS_COLLECTION, %error, "index setup failed");
        }
        if let Err(error) = self.items.collection.ensure_unique_index(&["id"]).await {
            warn!(collection = ITEMS_COLLECTION, %error, "index setup failed");
        }
        if let Err(error) = self
            .submissions
            .collection
            .ensure_unique_index(&["owner_id", "item_id"])
            .await
        {
            warn!(collection = SUBMISSIONS_COLLECTION, %error, "index setup failed");
        }
        if let Err(error) = self
            .bug_reports
            .collection
            .ensure_unique_index(&["item_id"])
            .await
        {
            warn!(collection = BUG_REPORTS_COLLECTION, %error, "index setup failed");
        }
    }
}

fn id_filter(key: &str, value: Value) -> Map<String, Value> {
    let mut filter = Map::new();
    filter.insert(key.to_string(), value);
    filter
}

/// Serialize an entity into the flat field map `update_one` expects.
fn to_set_map<T: serde::Serialize>(entity: &T) -> Result<Map<String, Value>, JobError> {
    let value = serde_json::to_value(entity)
        .map_err(|e| StoreError::SerializationError(SerializationError::JsonError(e)))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(JobError::invalid_entity("entity must serialize to an object")),
    }
}

// ============================================================================
// Contributors
// ============================================================================

#[derive(Debug, Clone)]
pub struct ContributorsRepo {
    collection: Collection<Contributor>,
    bootstrap_manager_id: Option<u64>,
}

impl ContributorsRepo {
    pub async fn get_by_id(&self, id: u64) -> Result<Option<Contributor>, JobError> {
        Ok(self.collection.find_one(&id_filter("id", id.into())).await?)
    }

    pub async fn get_by_login(&self, login: &str) -> Result<Option<Contributor>, JobError> {
        Ok(self
            .collection
            .find_one(&id_filter("login", login.into()))
            .await?)
    }

    /// Create-or-refresh a contributor from a webhook observation.
    ///
    /// Existing records get their profile fields refreshed; `role`, `rate`
    /// and `created_at` are never touched after creation. New records get
    /// their role assigned exactly once: `manager` for the bootstrap id,
    /// `contributor` for everyone else.
    pub async fn upsert(&self, draft: Contributor) -> Result<Contributor, JobError> {
        if self.get_by_id(draft.id).await?.is_some() {
            return self.refresh_profile(&draft).await;
        }

        let mut fresh = draft.clone();
        fresh.role = if self.bootstrap_manager_id == Some(fresh.id) {
            UserRole::Manager
        } else {
            UserRole::Contributor
        };
        let now = Utc::now();
        fresh.created_at = Some(now);
        fresh.updated_at = Some(now);

        match self.collection.insert_one(&fresh).await {
            Ok(()) => {}
            // Concurrent creation for the same id; the winner's record is
            // the one to refresh.
            Err(StoreError::DuplicateKey { .. }) => return self.refresh_profile(&draft).await,
            Err(error) => return Err(error.into()),
        }

        self.get_by_id(fresh.id)
            .await?
            .ok_or_else(|| update_failed(CONTRIBUTORS_COLLECTION, &format!("id={}", fresh.id)))
    }

    async fn refresh_profile(&self, draft: &Contributor) -> Result<Contributor, JobError> {
        let mut set = Map::new();
        set.insert("login".to_string(), draft.login.clone().into());
        set.insert("name".to_string(), draft.name.clone().into());
        set.insert("url".to_string(), draft.url.clone().into());
        set.insert("avatar_url".to_string(), draft.avatar_url.clone().into());
        set.insert("updated_at".to_string(), serde_json::json!(Utc::now()));

        let filter = id_filter("id", draft.id.into());
        let outcome = self.collection.update_one(&filter, &set, false).await?;
        if outcome.matched == 0 {
            return Err(update_failed(
                CONTRIBUTORS_COLLECTION,
                &format!("id={}", draft.id),
            ));
        }
        self.collection
            .find_one(&filter)
            .await?
            .ok_or_else(|| update_failed(CONTRIBUTORS_COLLECTION, &format!("id={}", draft.id)))
    }

    pub async fn get_many(&self, query: &ParsedQuery) -> Result<Vec<Contributor>, JobError> {
        Ok(self.collection.find(query).await?)
    }
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone)]
pub struct ItemsRepo {
    collection: Collection<Item>,
}

impl ItemsRepo {
    pub async fn get_by_id(&self, id: u64) -> Result<Option<Item>, JobError> {
        Ok(self.collection.find_one(&id_filter("id", id.into())).await?)
    }

    /// Write a normalized item, creating it when absent.
    ///
    /// The caller is expected to have merged the stored state already (see
    /// `normalize_pull_request`); this method only stamps timestamps and
    /// persists the full document.
    pub async fn upsert(&self, mut item: Item) -> Result<Item, JobError> {
        let now = Utc::now();
        item.updated_at = Some(now);
        if item.created_at.is_none() {
            item.created_at = Some(now);
        }

        let filter = id_filter("id", item.id.into());
        let set = to_set_map(&item)?;
        self.collection.update_one(&filter, &set, true).await?;
        self.collection
            .find_one(&filter)
            .await?
            .ok_or_else(|| update_failed(ITEMS_COLLECTION, &format!("id={}", item.id)))
    }

    /// Record a submission id against an item and refresh its timestamp.
    pub async fn attach_submission(&self, item_id: u64, submission_id: &str) -> Result<Item, JobError> {
        let mut item = self
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| update_failed(ITEMS_COLLECTION, &format!("id={item_id}")))?;
        item.add_submission(submission_id);
        self.upsert(item).await
    }

    /// Refresh an item's `updated_at`, used when a related submission
    /// changes without the item itself changing.
    pub async fn touch(&self, item_id: u64) -> Result<(), JobError> {
        let filter = id_filter("id", item_id.into());
        let mut set = Map::new();
        set.insert("updated_at".to_string(), serde_json::json!(Utc::now()));
        let outcome = self.collection.update_one(&filter, &set, false).await?;
        if outcome.matched == 0 {
            return Err(update_failed(ITEMS_COLLECTION, &format!("id={item_id}")));
        }
        Ok(())
    }

    /// Query items; unless the caller filters on `merged` explicitly, only
    /// merged items are returned since those are the invoiceable ones.
    pub async fn get_many(&self, query: &ParsedQuery) -> Result<Vec<Item>, JobError> {
        let mut query = query.clone();
        query
            .filter
            .entry("merged".to_string())
            .or_insert(Value::Bool(true));
        Ok(self.collection.find(&query).await?)
    }

    /// Distinct values of one item field, for populating filter dropdowns.
    pub async fn distinct_field(&self, field: &str) -> Result<Vec<Value>, JobError> {
        if !ITEM_QUERY_FIELDS.contains(&field) {
            return Err(JobError::invalid_entity(format!(
                "field {field:?} is not queryable"
            )));
        }
        Ok(self.collection.distinct(field, &Map::new()).await?)
    }
}

// ============================================================================
// Submissions
// ============================================================================

#[derive(Debug, Clone)]
pub struct SubmissionsRepo {
    collection: Collection<Submission>,
}

impl SubmissionsRepo {
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Submission>, JobError> {
        Ok(self.collection.find_one(&id_filter("id", id.into())).await?)
    }

    /// The composite business key: one submission per contributor per item.
    pub async fn get_by_owner_and_item(
        &self,
        owner_id: u64,
        item_id: u64,
    ) -> Result<Option<Submission>, JobError> {
        let mut filter = Map::new();
        filter.insert("owner_id".to_string(), owner_id.into());
        filter.insert("item_id".to_string(), item_id.into());
        Ok(self.collection.find_one(&filter).await?)
    }

    /// Insert a new submission; a second claim for the same
    /// `(owner_id, item_id)` pair surfaces the store's duplicate-key error.
    pub async fn create(&self, mut submission: Submission) -> Result<Submission, JobError> {
        submission.validate()?;
        let now = Utc::now();
        if submission.created_at.is_none() {
            submission.created_at = Some(now);
        }
        submission.updated_at = submission.updated_at.or(Some(now));

        self.collection.insert_one(&submission).await?;
        self.get_by_id(&submission.id)
            .await?
            .ok_or_else(|| update_failed(SUBMISSIONS_COLLECTION, &format!("id={}", submission.id)))
    }

    /// Apply an allow-listed field patch to a submission.
    pub async fn update(&self, id: &str, mut set: Map<String, Value>) -> Result<Submission, JobError> {
        set.insert("updated_at".to_string(), serde_json::json!(Utc::now()));
        let filter = id_filter("id", id.into());
        let outcome = self.collection.update_one(&filter, &set, false).await?;
        if outcome.matched == 0 {
            return Err(update_failed(SUBMISSIONS_COLLECTION, &format!("id={id}")));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| update_failed(SUBMISSIONS_COLLECTION, &format!("id={id}")))
    }

    pub async fn get_many(&self, query: &ParsedQuery) -> Result<Vec<Submission>, JobError> {
        Ok(self.collection.find(query).await?)
    }
}

// ============================================================================
// Bug reports
// ============================================================================

#[derive(Debug, Clone)]
pub struct BugReportsRepo {
    collection: Collection<BugReport>,
}

impl BugReportsRepo {
    pub async fn get_by_item(&self, item_id: u64) -> Result<Option<BugReport>, JobError> {
        Ok(self
            .collection
            .find_one(&id_filter("item_id", item_id.into()))
            .await?)
    }

    /// First writer wins: a second report for the same item id fails with
    /// the store's duplicate-key error and leaves the original untouched.
    pub async fn create(&self, mut report: BugReport) -> Result<BugReport, JobError> {
        let now = Utc::now();
        report.created_at = Some(now);
        report.updated_at = Some(now);

        self.collection.insert_one(&report).await?;
        self.get_by_item(report.item_id)
            .await?
            .ok_or_else(|| update_failed(BUG_REPORTS_COLLECTION, &format!("item_id={}", report.item_id)))
    }

    pub async fn get_many(&self, query: &ParsedQuery) -> Result<Vec<BugReport>, JobError> {
        Ok(self.collection.find(query).await?)
    }
}

fn update_failed(collection: &str, key: &str) -> JobError {
    JobError::UpdateFailed {
        collection: collection.to_string(),
        key: key.to_string(),
    }
}

#[cfg(test)]
#[path = "repositories_tests.rs"]
mod tests;
