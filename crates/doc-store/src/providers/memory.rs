//! In-memory document store provider implementation.
//!
//! This module provides a fully functional in-memory store that:
//! - Supports equality filtering, compound sorting, and skip/limit paging
//! - Enforces unique indexes with missing fields treated as null
//! - Provides thread-safe concurrent access
//!
//! This provider is intended for:
//! - Unit testing of doc-store consumers
//! - Development and prototyping
//!
//! Each provider instance owns its documents; a gateway that reconnects gets
//! a fresh, empty store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::client::{StoreProvider, UpdateOutcome};
use crate::error::StoreError;
use crate::provider::{InMemoryConfig, ProviderType};
use crate::query::{ParsedQuery, SortOrder};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all collections
struct Storage {
    collections: HashMap<String, CollectionStore>,
}

impl Storage {
    fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    fn collection_mut(&mut self, name: &str) -> &mut CollectionStore {
        self.collections
            .entry(name.to_string())
            .or_insert_with(CollectionStore::new)
    }
}

/// Documents and index declarations for a single collection
struct CollectionStore {
    /// Documents in insertion order
    documents: Vec<Value>,
    /// Key sets with a uniqueness constraint
    unique_indexes: Vec<Vec<String>>,
}

impl CollectionStore {
    fn new() -> Self {
        Self {
            documents: Vec::new(),
            unique_indexes: Vec::new(),
        }
    }

    /// Find another document carrying the same unique-key values as the
    /// candidate. Missing key fields count as null, so two documents both
    /// lacking a key field collide.
    fn unique_violation(&self, candidate: &Value, skip_index: Option<usize>) -> Option<&[String]> {
        for keys in &self.unique_indexes {
            let candidate_key = index_key(candidate, keys);
            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip_index)
                .any(|(_, existing)| index_key(existing, keys) == candidate_key);
            if clash {
                return Some(keys);
            }
        }
        None
    }
}

fn index_key<'a>(document: &'a Value, keys: &[String]) -> Vec<&'a Value> {
    keys.iter()
        .map(|key| document.get(key).unwrap_or(&Value::Null))
        .collect()
}

// ============================================================================
// Provider
// ============================================================================

/// In-memory implementation of [`StoreProvider`]
pub struct InMemoryProvider {
    storage: RwLock<Storage>,
    config: InMemoryConfig,
}

impl InMemoryProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: RwLock::new(Storage::new()),
            config,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Storage>, StoreError> {
        self.storage.read().map_err(|_| lock_error())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Storage>, StoreError> {
        self.storage.write().map_err(|_| lock_error())
    }

    fn check_capacity(&self, collection: &CollectionStore, name: &str) -> Result<(), StoreError> {
        if collection.documents.len() >= self.config.max_collection_size {
            return Err(StoreError::ProviderError {
                provider: "memory".to_string(),
                message: format!(
                    "collection {} holds {} documents, the configured bound",
                    name, self.config.max_collection_size
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StoreProvider for InMemoryProvider {
    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let storage = self.read()?;
        let Some(store) = storage.collections.get(collection) else {
            return Ok(None);
        };
        Ok(store
            .documents
            .iter()
            .find(|doc| matches_filter(doc, filter))
            .cloned())
    }

    async fn find(&self, collection: &str, query: &ParsedQuery) -> Result<Vec<Value>, StoreError> {
        let storage = self.read()?;
        let Some(store) = storage.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<&Value> = store
            .documents
            .iter()
            .filter(|doc| matches_filter(doc, &query.filter))
            .collect();
        matched.sort_by(|a, b| compare_documents(a, b, &query.sort));

        Ok(matched
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn insert_one(&self, collection: &str, document: &Value) -> Result<(), StoreError> {
        let mut storage = self.write()?;
        let store = storage.collection_mut(collection);
        self.check_capacity(store, collection)?;

        if let Some(keys) = store.unique_violation(document, None) {
            return Err(duplicate_key(collection, keys));
        }

        store.documents.push(document.clone());
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        set: &Map<String, Value>,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut storage = self.write()?;
        let store = storage.collection_mut(collection);

        let position = store
            .documents
            .iter()
            .position(|doc| matches_filter(doc, filter));

        if let Some(index) = position {
            let mut updated = store.documents[index].clone();
            let changed = apply_set(&mut updated, set);

            if changed {
                if let Some(keys) = store.unique_violation(&updated, Some(index)) {
                    return Err(duplicate_key(collection, keys));
                }
                store.documents[index] = updated;
            }

            return Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(changed),
                upserted: false,
            });
        }

        if !upsert {
            return Ok(UpdateOutcome {
                matched: 0,
                modified: 0,
                upserted: false,
            });
        }

        // Upserted documents start from the filter so the business key they
        // were addressed by is part of the stored document.
        let mut document = Value::Object(filter.clone());
        apply_set(&mut document, set);

        self.check_capacity(store, collection)?;
        if let Some(keys) = store.unique_violation(&document, None) {
            return Err(duplicate_key(collection, keys));
        }
        store.documents.push(document);

        Ok(UpdateOutcome {
            matched: 0,
            modified: 0,
            upserted: true,
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let mut storage = self.write()?;
        let Some(store) = storage.collections.get_mut(collection) else {
            return Ok(false);
        };

        let position = store
            .documents
            .iter()
            .position(|doc| matches_filter(doc, filter));
        match position {
            Some(index) => {
                store.documents.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Value>, StoreError> {
        let storage = self.read()?;
        let Some(store) = storage.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut values: Vec<Value> = Vec::new();
        for document in store
            .documents
            .iter()
            .filter(|doc| matches_filter(doc, filter))
        {
            match document.get(field) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
            }
        }
        Ok(values)
    }

    async fn ensure_index(
        &self,
        collection: &str,
        keys: &[&str],
        unique: bool,
    ) -> Result<(), StoreError> {
        if !unique {
            // Plain indexes carry no semantics here; lookups scan anyway.
            return Ok(());
        }

        let mut storage = self.write()?;
        let store = storage.collection_mut(collection);
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        if store.unique_indexes.contains(&keys) {
            return Ok(());
        }

        // Refuse the constraint when existing documents already violate it.
        for (index, document) in store.documents.iter().enumerate() {
            let key = index_key(document, &keys);
            let clash = store.documents[..index]
                .iter()
                .any(|existing| index_key(existing, &keys) == key);
            if clash {
                return Err(duplicate_key(collection, &keys));
            }
        }

        store.unique_indexes.push(keys);
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

// ============================================================================
// Matching and Ordering
// ============================================================================

/// Equality match with MongoDB's array semantics: a scalar constraint on
/// an array field matches when any element equals it.
fn matches_filter(document: &Value, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(field, expected)| match document.get(field) {
            Some(Value::Array(elements)) if !expected.is_array() => elements.contains(expected),
            actual => actual == Some(expected),
        })
}

fn compare_documents(a: &Value, b: &Value, sort: &[(String, SortOrder)]) -> Ordering {
    for (field, order) in sort {
        let ordering = compare_values(a.get(field), b.get(field));
        let ordering = match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over JSON values for sorting: null and missing sort lowest,
/// then booleans, numbers, strings; arrays and objects compare as equal
/// among themselves.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank_a = value_rank(a);
    let rank_b = value_rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn value_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Set fields on a document, reporting whether anything changed.
fn apply_set(document: &mut Value, set: &Map<String, Value>) -> bool {
    let Some(target) = document.as_object_mut() else {
        return false;
    };

    let mut changed = false;
    for (field, value) in set {
        if target.get(field) != Some(value) {
            target.insert(field.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

fn duplicate_key(collection: &str, keys: &[String]) -> StoreError {
    StoreError::DuplicateKey {
        collection: collection.to_string(),
        message: format!("unique index on ({}) violated", keys.join(", ")),
    }
}

fn lock_error() -> StoreError {
    StoreError::ProviderError {
        provider: "memory".to_string(),
        message: "storage lock poisoned".to_string(),
    }
}
