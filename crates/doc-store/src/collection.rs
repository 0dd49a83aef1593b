//! Typed views over named collections.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::client::{StoreProvider, UpdateOutcome};
use crate::error::{SerializationError, StoreError};
use crate::query::ParsedQuery;

/// A typed view over one collection.
///
/// Documents cross the provider boundary as JSON values; this wrapper does
/// the serde conversion at the edge so repositories work with domain types.
pub struct Collection<T> {
    provider: Arc<dyn StoreProvider>,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T> {
    pub(crate) fn new(provider: Arc<dyn StoreProvider>, name: &str) -> Self {
        Self {
            provider,
            name: name.to_string(),
            _marker: PhantomData,
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Fetch the first document matching the filter.
    pub async fn find_one(&self, filter: &Map<String, Value>) -> Result<Option<T>, StoreError> {
        let document = self.provider.find_one(&self.name, filter).await?;
        document.map(from_document).transpose()
    }

    /// Fetch documents matching a parsed query, sorted and paged.
    pub async fn find(&self, query: &ParsedQuery) -> Result<Vec<T>, StoreError> {
        let documents = self.provider.find(&self.name, query).await?;
        documents.into_iter().map(from_document).collect()
    }

    /// Insert a single document.
    pub async fn insert_one(&self, document: &T) -> Result<(), StoreError> {
        let value = to_document(document)?;
        self.provider.insert_one(&self.name, &value).await
    }

    /// Set fields on the first document matching the filter.
    pub async fn update_one(
        &self,
        filter: &Map<String, Value>,
        set: &Map<String, Value>,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        self.provider
            .update_one(&self.name, filter, set, upsert)
            .await
    }

    /// Delete the first document matching the filter.
    pub async fn delete_one(&self, filter: &Map<String, Value>) -> Result<bool, StoreError> {
        self.provider.delete_one(&self.name, filter).await
    }

    /// Distinct values of a field across documents matching the filter.
    pub async fn distinct(
        &self,
        field: &str,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Value>, StoreError> {
        self.provider.distinct(&self.name, field, filter).await
    }

    /// Declare a unique index over the given keys.
    pub async fn ensure_unique_index(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.provider.ensure_index(&self.name, keys, true).await
    }
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish()
    }
}

fn to_document<T: Serialize>(document: &T) -> Result<Value, StoreError> {
    let value = serde_json::to_value(document)
        .map_err(|e| StoreError::SerializationError(SerializationError::JsonError(e)))?;
    if !value.is_object() {
        return Err(StoreError::SerializationError(
            SerializationError::InvalidDocument {
                message: "documents must serialize to JSON objects".to_string(),
            },
        ));
    }
    Ok(value)
}

fn from_document<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::SerializationError(SerializationError::JsonError(e)))
}

#[cfg(test)]
#[path = "collection_tests.rs"]
mod tests;
