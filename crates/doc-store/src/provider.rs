//! Provider types and configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumeration of supported document store providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    Http,
    InMemory,
}

impl ProviderType {
    /// Check if the provider can create and enforce indexes.
    ///
    /// The HTTP data API exposes no index management; callers treat index
    /// setup as advisory there and rely on server-side enforcement.
    pub fn supports_index_management(&self) -> bool {
        match self {
            Self::Http => false,
            Self::InMemory => true,
        }
    }
}

/// Configuration for store gateway initialization
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub provider: ProviderConfig,
    /// Time allowed for establishing a connection
    pub connect_timeout: Duration,
    /// Client-side bound on the liveness probe
    pub ping_timeout: Duration,
    pub max_retry_attempts: u32,
    pub retry_base_delay: Duration,
    /// Idle pool floor; zero keeps serverless instances socket-free
    pub min_pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::InMemory(InMemoryConfig::default()),
            connect_timeout: Duration::seconds(5),
            ping_timeout: Duration::seconds(2),
            max_retry_attempts: 3,
            retry_base_delay: Duration::seconds(1),
            min_pool_size: 0,
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProviderConfig {
    Http(HttpConfig),
    InMemory(InMemoryConfig),
}

/// HTTP data-API provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base endpoint, e.g. `https://data.example.net/app/tracker/endpoint/data/v1`
    pub endpoint: String,

    /// Named cluster or data source to address
    pub data_source: String,

    /// Database holding the tracker collections
    pub database: String,

    /// API key sent with every request
    pub api_key: String,
}

impl fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConfig")
            .field("endpoint", &self.endpoint)
            .field("data_source", &self.data_source)
            .field("database", &self.database)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryConfig {
    /// Upper bound on documents held per collection
    pub max_collection_size: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_collection_size: 10_000,
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
