//! HTTP data-API provider implementation.
//!
//! Speaks a document-oriented data API: every operation is a POST to
//! `{endpoint}/action/{verb}` authenticated by an `api-key` header, with the
//! target data source, database, and collection named in the body. Field
//! updates travel as `$set` documents; distinct values are computed through
//! an aggregation pipeline because the API has no dedicated distinct verb.

use async_trait::async_trait;
use chrono::Duration;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::{StoreProvider, UpdateOutcome};
use crate::error::{ConfigurationError, SerializationError, StoreError};
use crate::provider::{HttpConfig, ProviderType};
use crate::query::ParsedQuery;

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

const API_KEY_HEADER: &str = "api-key";

/// Overall budget for a single data-API request.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// The liveness probe runs findOne against this collection; the API answers
/// null for collections that do not exist, which is all the probe needs.
const PING_COLLECTION: &str = "ping";

/// HTTP implementation of [`StoreProvider`]
pub struct HttpProvider {
    http: reqwest::Client,
    config: HttpConfig,
}

impl HttpProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: HttpConfig, connect_timeout: Duration) -> Result<Self, StoreError> {
        let connect = connect_timeout
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(5));
        let http = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                StoreError::ConfigurationError(ConfigurationError::Invalid {
                    message: format!("http client construction failed: {}", e),
                })
            })?;

        Ok(Self { http, config })
    }

    fn action_url(&self, action: &str) -> String {
        format!(
            "{}/action/{}",
            self.config.endpoint.trim_end_matches('/'),
            action
        )
    }

    fn base_body(&self, collection: &str) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("dataSource".to_string(), json!(self.config.data_source));
        body.insert("database".to_string(), json!(self.config.database));
        body.insert("collection".to_string(), json!(collection));
        body
    }

    async fn post(
        &self,
        action: &str,
        collection: &str,
        body: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        let response = self
            .http
            .post(self.action_url(action))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(request_error);
        }

        let message = response.text().await.unwrap_or_default();
        Err(response_error(status, collection, message))
    }
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl StoreProvider for HttpProvider {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut body = self.base_body(PING_COLLECTION);
        body.insert("filter".to_string(), json!({}));
        self.post("findOne", PING_COLLECTION, body).await.map(|_| ())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let mut body = self.base_body(collection);
        body.insert("filter".to_string(), Value::Object(filter.clone()));

        let response = self.post("findOne", collection, body).await?;
        let parsed: FindOneResponse = parse(response)?;
        Ok(parsed.document)
    }

    async fn find(&self, collection: &str, query: &ParsedQuery) -> Result<Vec<Value>, StoreError> {
        let mut body = self.base_body(collection);
        body.insert("filter".to_string(), Value::Object(query.filter.clone()));
        body.insert("sort".to_string(), sort_document(query));
        body.insert("skip".to_string(), json!(query.skip));
        body.insert("limit".to_string(), json!(query.limit));

        let response = self.post("find", collection, body).await?;
        let parsed: FindResponse = parse(response)?;
        Ok(parsed.documents)
    }

    async fn insert_one(&self, collection: &str, document: &Value) -> Result<(), StoreError> {
        let mut body = self.base_body(collection);
        body.insert("document".to_string(), document.clone());

        self.post("insertOne", collection, body).await.map(|_| ())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        set: &Map<String, Value>,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut body = self.base_body(collection);
        body.insert("filter".to_string(), Value::Object(filter.clone()));
        body.insert(
            "update".to_string(),
            json!({ "$set": Value::Object(set.clone()) }),
        );
        body.insert("upsert".to_string(), json!(upsert));

        let response = self.post("updateOne", collection, body).await?;
        let parsed: UpdateResponse = parse(response)?;
        Ok(UpdateOutcome {
            matched: parsed.matched_count,
            modified: parsed.modified_count,
            upserted: parsed.upserted_id.is_some(),
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let mut body = self.base_body(collection);
        body.insert("filter".to_string(), Value::Object(filter.clone()));

        let response = self.post("deleteOne", collection, body).await?;
        let parsed: DeleteResponse = parse(response)?;
        Ok(parsed.deleted_count > 0)
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut body = self.base_body(collection);
        body.insert(
            "pipeline".to_string(),
            json!([
                { "$match": Value::Object(filter.clone()) },
                { "$group": { "_id": format!("${}", field) } },
            ]),
        );

        let response = self.post("aggregate", collection, body).await?;
        let parsed: FindResponse = parse(response)?;
        Ok(parsed
            .documents
            .into_iter()
            .filter_map(|doc| match doc.get("_id") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.clone()),
            })
            .collect())
    }

    async fn ensure_index(
        &self,
        collection: &str,
        keys: &[&str],
        unique: bool,
    ) -> Result<(), StoreError> {
        debug!(
            collection,
            ?keys,
            unique,
            "data api has no index management, relying on server-side indexes"
        );
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Http
    }
}

// ============================================================================
// Response Shapes
// ============================================================================

#[derive(Deserialize)]
struct FindOneResponse {
    document: Option<Value>,
}

#[derive(Deserialize)]
struct FindResponse {
    documents: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    matched_count: u64,
    modified_count: u64,
    #[serde(default)]
    upserted_id: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    deleted_count: u64,
}

// ============================================================================
// Helpers
// ============================================================================

fn sort_document(query: &ParsedQuery) -> Value {
    let mut sort = Map::new();
    for (field, order) in &query.sort {
        sort.insert(field.clone(), json!(order.as_i32()));
    }
    Value::Object(sort)
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::SerializationError(SerializationError::JsonError(e)))
}

fn request_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        return StoreError::Timeout {
            duration: Duration::from_std(REQUEST_TIMEOUT).unwrap_or(Duration::seconds(30)),
        };
    }
    StoreError::ConnectionFailed {
        message: err.to_string(),
    }
}

fn response_error(status: StatusCode, collection: &str, message: String) -> StoreError {
    if message.contains("E11000") || message.contains("duplicate key") {
        return StoreError::DuplicateKey {
            collection: collection.to_string(),
            message,
        };
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::AuthenticationFailed { message }
        }
        StatusCode::NOT_FOUND => StoreError::CollectionNotFound {
            collection: collection.to_string(),
        },
        _ => StoreError::ProviderError {
            provider: "http".to_string(),
            message: format!("{}: {}", status, message),
        },
    }
}
