//! Tests for the in-memory provider.

use super::*;
use serde_json::json;

fn provider() -> InMemoryProvider {
    InMemoryProvider::new(InMemoryConfig::default())
}

fn filter(value: Value) -> Map<String, Value> {
    crate::query::filter_object(value)
}

async fn seed(provider: &InMemoryProvider, collection: &str, documents: Vec<Value>) {
    for document in documents {
        provider.insert_one(collection, &document).await.unwrap();
    }
}

// ============================================================================
// Lookup Tests
// ============================================================================

#[tokio::test]
async fn test_find_one_returns_first_match() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![
            json!({ "id": 1, "org": "acme" }),
            json!({ "id": 2, "org": "acme" }),
        ],
    )
    .await;

    let found = provider
        .find_one("items", &filter(json!({ "org": "acme" })))
        .await
        .unwrap();

    assert_eq!(found.unwrap()["id"], json!(1));
}

#[tokio::test]
async fn test_find_one_unknown_collection_is_none() {
    let provider = provider();

    let found = provider.find_one("missing", &Map::new()).await.unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn test_find_filters_on_all_fields() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![
            json!({ "id": 1, "org": "acme", "repo": "tracker" }),
            json!({ "id": 2, "org": "acme", "repo": "site" }),
            json!({ "id": 3, "org": "other", "repo": "tracker" }),
        ],
    )
    .await;

    let query = ParsedQuery::with_filter(filter(json!({ "org": "acme", "repo": "tracker" })));
    let found = provider.find("items", &query).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], json!(1));
}

#[tokio::test]
async fn test_find_scalar_filter_matches_array_membership() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![
            json!({ "id": 1, "contributor_ids": [7, 8] }),
            json!({ "id": 2, "contributor_ids": [9] }),
            json!({ "id": 3, "contributor_ids": [] }),
        ],
    )
    .await;

    let query = ParsedQuery::with_filter(filter(json!({ "contributor_ids": 7 })));
    let found = provider.find("items", &query).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], json!(1));
}

// ============================================================================
// Sort and Paging Tests
// ============================================================================

#[tokio::test]
async fn test_find_sorts_newest_first() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![
            json!({ "id": 1, "updated_at": "2024-01-01T00:00:00Z" }),
            json!({ "id": 2, "updated_at": "2024-03-01T00:00:00Z" }),
            json!({ "id": 3, "updated_at": "2024-02-01T00:00:00Z" }),
        ],
    )
    .await;

    let found = provider.find("items", &ParsedQuery::default()).await.unwrap();

    let ids: Vec<_> = found.iter().map(|doc| doc["id"].clone()).collect();
    assert_eq!(ids, vec![json!(2), json!(3), json!(1)]);
}

#[tokio::test]
async fn test_find_breaks_ties_on_created_at() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![
            json!({ "id": 1, "updated_at": "2024-01-01T00:00:00Z", "created_at": "2023-01-01T00:00:00Z" }),
            json!({ "id": 2, "updated_at": "2024-01-01T00:00:00Z", "created_at": "2023-06-01T00:00:00Z" }),
        ],
    )
    .await;

    let found = provider.find("items", &ParsedQuery::default()).await.unwrap();

    assert_eq!(found[0]["id"], json!(2));
    assert_eq!(found[1]["id"], json!(1));
}

#[tokio::test]
async fn test_documents_without_sort_field_come_last() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![
            json!({ "id": 1 }),
            json!({ "id": 2, "updated_at": "2024-01-01T00:00:00Z" }),
        ],
    )
    .await;

    let found = provider.find("items", &ParsedQuery::default()).await.unwrap();

    assert_eq!(found[0]["id"], json!(2));
    assert_eq!(found[1]["id"], json!(1));
}

#[tokio::test]
async fn test_find_applies_skip_and_limit() {
    let provider = provider();
    let documents = (1..=5)
        .map(|i| json!({ "id": i, "updated_at": format!("2024-01-0{}T00:00:00Z", i) }))
        .collect();
    seed(&provider, "items", documents).await;

    let mut query = ParsedQuery::default();
    query.skip = 1;
    query.limit = 2;
    let found = provider.find("items", &query).await.unwrap();

    // Newest first is 5, 4, 3, 2, 1; skipping one leaves 4 and 3.
    let ids: Vec<_> = found.iter().map(|doc| doc["id"].clone()).collect();
    assert_eq!(ids, vec![json!(4), json!(3)]);
}

// ============================================================================
// Write Tests
// ============================================================================

#[tokio::test]
async fn test_update_one_sets_fields() {
    let provider = provider();
    seed(&provider, "items", vec![json!({ "id": 1, "title": "old" })]).await;

    let outcome = provider
        .update_one(
            "items",
            &filter(json!({ "id": 1 })),
            &filter(json!({ "title": "new" })),
            false,
        )
        .await
        .unwrap();

    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.modified, 1);
    assert!(!outcome.upserted);

    let found = provider
        .find_one("items", &filter(json!({ "id": 1 })))
        .await
        .unwrap();
    assert_eq!(found.unwrap()["title"], json!("new"));
}

#[tokio::test]
async fn test_update_one_with_unchanged_values_modifies_nothing() {
    let provider = provider();
    seed(&provider, "items", vec![json!({ "id": 1, "title": "same" })]).await;

    let outcome = provider
        .update_one(
            "items",
            &filter(json!({ "id": 1 })),
            &filter(json!({ "title": "same" })),
            false,
        )
        .await
        .unwrap();

    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.modified, 0);
}

#[tokio::test]
async fn test_update_one_without_match_reports_zero() {
    let provider = provider();

    let outcome = provider
        .update_one(
            "items",
            &filter(json!({ "id": 404 })),
            &filter(json!({ "title": "x" })),
            false,
        )
        .await
        .unwrap();

    assert_eq!(outcome.matched, 0);
    assert!(!outcome.upserted);
}

#[tokio::test]
async fn test_upsert_creates_document_from_filter_and_set() {
    let provider = provider();

    let outcome = provider
        .update_one(
            "items",
            &filter(json!({ "id": 9 })),
            &filter(json!({ "title": "fresh" })),
            true,
        )
        .await
        .unwrap();

    assert!(outcome.upserted);

    let found = provider
        .find_one("items", &filter(json!({ "id": 9 })))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["title"], json!("fresh"));
    assert_eq!(found["id"], json!(9));
}

#[tokio::test]
async fn test_delete_one_removes_first_match() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![json!({ "id": 1 }), json!({ "id": 2 })],
    )
    .await;

    assert!(provider
        .delete_one("items", &filter(json!({ "id": 1 })))
        .await
        .unwrap());
    assert!(!provider
        .delete_one("items", &filter(json!({ "id": 1 })))
        .await
        .unwrap());

    let remaining = provider.find("items", &ParsedQuery::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_insert_respects_capacity_bound() {
    let provider = InMemoryProvider::new(InMemoryConfig {
        max_collection_size: 2,
    });
    seed(
        &provider,
        "items",
        vec![json!({ "id": 1 }), json!({ "id": 2 })],
    )
    .await;

    let err = provider
        .insert_one("items", &json!({ "id": 3 }))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::ProviderError { .. }));
}

// ============================================================================
// Unique Index Tests
// ============================================================================

#[tokio::test]
async fn test_unique_index_rejects_duplicate_insert() {
    let provider = provider();
    provider
        .ensure_index("submissions", &["owner_id", "item_id"], true)
        .await
        .unwrap();
    seed(
        &provider,
        "submissions",
        vec![json!({ "owner_id": 1, "item_id": 10, "hours": 2 })],
    )
    .await;

    let err = provider
        .insert_one("submissions", &json!({ "owner_id": 1, "item_id": 10, "hours": 5 }))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn test_unique_index_allows_distinct_keys() {
    let provider = provider();
    provider
        .ensure_index("submissions", &["owner_id", "item_id"], true)
        .await
        .unwrap();

    seed(
        &provider,
        "submissions",
        vec![
            json!({ "owner_id": 1, "item_id": 10 }),
            json!({ "owner_id": 1, "item_id": 11 }),
            json!({ "owner_id": 2, "item_id": 10 }),
        ],
    )
    .await;
}

#[tokio::test]
async fn test_unique_index_treats_missing_fields_as_null() {
    let provider = provider();
    provider
        .ensure_index("bug_reports", &["item_id"], true)
        .await
        .unwrap();
    seed(&provider, "bug_reports", vec![json!({ "commit": "abc" })]).await;

    let err = provider
        .insert_one("bug_reports", &json!({ "commit": "def" }))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn test_ensure_index_rejects_existing_duplicates() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![json!({ "id": 1 }), json!({ "id": 1 })],
    )
    .await;

    let err = provider.ensure_index("items", &["id"], true).await.unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn test_ensure_index_is_idempotent() {
    let provider = provider();
    provider.ensure_index("items", &["id"], true).await.unwrap();
    provider.ensure_index("items", &["id"], true).await.unwrap();

    seed(&provider, "items", vec![json!({ "id": 1 })]).await;
}

#[tokio::test]
async fn test_update_cannot_break_unique_index() {
    let provider = provider();
    provider.ensure_index("items", &["id"], true).await.unwrap();
    seed(
        &provider,
        "items",
        vec![json!({ "id": 1 }), json!({ "id": 2 })],
    )
    .await;

    let err = provider
        .update_one(
            "items",
            &filter(json!({ "id": 2 })),
            &filter(json!({ "id": 1 })),
            false,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    // The clash must leave the original document in place.
    let kept = provider
        .find_one("items", &filter(json!({ "id": 2 })))
        .await
        .unwrap();
    assert!(kept.is_some());
}

// ============================================================================
// Distinct Tests
// ============================================================================

#[tokio::test]
async fn test_distinct_preserves_first_seen_order() {
    let provider = provider();
    seed(
        &provider,
        "contributors",
        vec![
            json!({ "id": 1, "login": "alice" }),
            json!({ "id": 2, "login": "bob" }),
            json!({ "id": 3, "login": "alice" }),
            json!({ "id": 4 }),
        ],
    )
    .await;

    let values = provider
        .distinct("contributors", "login", &Map::new())
        .await
        .unwrap();

    assert_eq!(values, vec![json!("alice"), json!("bob")]);
}

#[tokio::test]
async fn test_distinct_applies_filter() {
    let provider = provider();
    seed(
        &provider,
        "items",
        vec![
            json!({ "org": "acme", "repo": "tracker" }),
            json!({ "org": "acme", "repo": "site" }),
            json!({ "org": "other", "repo": "infra" }),
        ],
    )
    .await;

    let values = provider
        .distinct("items", "repo", &filter(json!({ "org": "acme" })))
        .await
        .unwrap();

    assert_eq!(values, vec![json!("tracker"), json!("site")]);
}

#[tokio::test]
async fn test_ping_succeeds() {
    assert!(provider().ping().await.is_ok());
}
