//! Client traits and the connection gateway.
//!
//! [`StoreGateway::acquire`] hands out a [`StoreHandle`] backed by a provider
//! that answered a liveness probe. The handle is cached for reuse; a caller
//! that hits a transient failure reports the handle back through
//! [`StoreGateway::invalidate`] so the next acquire reconnects.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::collection::Collection;
use crate::error::{ConfigurationError, StoreError};
use crate::provider::{ProviderConfig, ProviderType, StoreConfig};
use crate::providers::{HttpProvider, InMemoryProvider};
use crate::query::ParsedQuery;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by specific document store providers
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Cheap liveness probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Fetch the first document matching the filter
    async fn find_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    /// Fetch documents matching a parsed query, sorted and paged
    async fn find(&self, collection: &str, query: &ParsedQuery) -> Result<Vec<Value>, StoreError>;

    /// Insert a single document
    async fn insert_one(&self, collection: &str, document: &Value) -> Result<(), StoreError>;

    /// Set fields on the first document matching the filter.
    ///
    /// With `upsert` set, a missing document is created from the filter and
    /// set fields combined.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        set: &Map<String, Value>,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Delete the first document matching the filter
    async fn delete_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<bool, StoreError>;

    /// Distinct values of a field across documents matching the filter
    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Value>, StoreError>;

    /// Declare an index over the given keys.
    ///
    /// Providers without index management treat this as advisory and return
    /// Ok; uniqueness is then enforced server-side only.
    async fn ensure_index(
        &self,
        collection: &str,
        keys: &[&str],
        unique: bool,
    ) -> Result<(), StoreError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Result of an update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents the filter matched
    pub matched: u64,

    /// Documents actually changed
    pub modified: u64,

    /// Whether a document was created because nothing matched
    pub upserted: bool,
}

/// Factory for creating store gateways with appropriate providers
pub struct StoreClientFactory;

impl StoreClientFactory {
    /// Create a gateway from configuration
    pub fn create_gateway(config: StoreConfig) -> Result<StoreGateway, StoreError> {
        // Fail on unusable configuration up front rather than on first use
        Self::build_provider(&config)?;
        Ok(StoreGateway::new(config))
    }

    /// Create a test gateway backed by the in-memory provider
    pub fn create_test_gateway() -> StoreGateway {
        StoreGateway::new(StoreConfig::default())
    }

    fn build_provider(config: &StoreConfig) -> Result<Arc<dyn StoreProvider>, StoreError> {
        match &config.provider {
            ProviderConfig::InMemory(in_memory_config) => {
                Ok(Arc::new(InMemoryProvider::new(in_memory_config.clone())))
            }
            ProviderConfig::Http(http_config) => {
                if http_config.endpoint.is_empty() {
                    return Err(StoreError::ConfigurationError(
                        ConfigurationError::Missing {
                            key: "endpoint".to_string(),
                        },
                    ));
                }
                Ok(Arc::new(HttpProvider::new(
                    http_config.clone(),
                    config.connect_timeout,
                )?))
            }
        }
    }
}

/// A live connection to the document store.
///
/// Cheap to clone; all clones address the same provider.
#[derive(Clone)]
pub struct StoreHandle {
    provider: Arc<dyn StoreProvider>,
}

impl StoreHandle {
    fn new(provider: Arc<dyn StoreProvider>) -> Self {
        Self { provider }
    }

    /// Typed view over a named collection
    pub fn collection<T>(&self, name: &str) -> Collection<T> {
        Collection::new(Arc::clone(&self.provider), name)
    }

    /// Probe the underlying provider for liveness
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.provider.ping().await
    }

    /// Get provider type
    pub fn provider_type(&self) -> ProviderType {
        self.provider.provider_type()
    }

    fn same_provider(&self, other: &StoreHandle) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("provider_type", &self.provider.provider_type())
            .finish()
    }
}

/// Connection gateway caching one verified handle.
pub struct StoreGateway {
    config: StoreConfig,
    cached: RwLock<Option<StoreHandle>>,
}

impl StoreGateway {
    /// Create a gateway; no connection is attempted until first acquire.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cached: RwLock::new(None),
        }
    }

    /// Get the gateway configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get a verified handle, connecting if none is cached.
    ///
    /// Connection attempts are bounded by `max_retry_attempts` with
    /// exponential backoff; exhaustion yields
    /// [`StoreError::ConnectionFailed`].
    pub async fn acquire(&self) -> Result<StoreHandle, StoreError> {
        if let Some(handle) = self.cached_handle()? {
            return Ok(handle);
        }

        let attempts = self.config.max_retry_attempts.max(1);
        let mut last_error: Option<StoreError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = backoff_delay(self.config.retry_base_delay, attempt);
                tokio::time::sleep(backoff).await;
            }

            match self.connect().await {
                Ok(handle) => return self.store_handle(handle),
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        attempts,
                        error = %err,
                        "store connection attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        let detail = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no connection attempts were made".to_string());
        Err(StoreError::ConnectionFailed {
            message: format!("store unreachable after {} attempts: {}", attempts, detail),
        })
    }

    /// Drop the cached handle if it is still the one the caller saw fail.
    ///
    /// Another task may have reconnected in the meantime; that fresh handle
    /// must survive, so the clear compares identity first.
    pub fn invalidate(&self, failed: &StoreHandle) -> Result<(), StoreError> {
        let mut cached = self.cached.write().map_err(|_| lock_error())?;
        match cached.as_ref() {
            Some(current) if current.same_provider(failed) => {
                debug!("clearing failed store handle");
                *cached = None;
            }
            _ => {
                debug!("failed store handle already replaced, keeping cache");
            }
        }
        Ok(())
    }

    async fn connect(&self) -> Result<StoreHandle, StoreError> {
        let provider = StoreClientFactory::build_provider(&self.config)?;
        let ping_budget = self
            .config
            .ping_timeout
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        match tokio::time::timeout(ping_budget, provider.ping()).await {
            Ok(Ok(())) => Ok(StoreHandle::new(provider)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(StoreError::Timeout {
                duration: self.config.ping_timeout,
            }),
        }
    }

    fn cached_handle(&self) -> Result<Option<StoreHandle>, StoreError> {
        let cached = self.cached.read().map_err(|_| lock_error())?;
        Ok(cached.clone())
    }

    /// Publish a freshly connected handle unless another task won the race.
    fn store_handle(&self, handle: StoreHandle) -> Result<StoreHandle, StoreError> {
        let mut cached = self.cached.write().map_err(|_| lock_error())?;
        if let Some(existing) = cached.as_ref() {
            return Ok(existing.clone());
        }
        *cached = Some(handle.clone());
        Ok(handle)
    }
}

impl std::fmt::Debug for StoreGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreGateway")
            .field("config", &self.config)
            .finish()
    }
}

fn backoff_delay(base: chrono::Duration, attempt: u32) -> std::time::Duration {
    let base = base.to_std().unwrap_or(std::time::Duration::ZERO);
    base.saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
}

fn lock_error() -> StoreError {
    StoreError::ProviderError {
        provider: "gateway".to_string(),
        message: "handle cache lock poisoned".to_string(),
    }
}
