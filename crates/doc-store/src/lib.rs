//! # Doc Store
//!
//! Provider-agnostic document store gateway used by the tracker services,
//! with HTTP data-API and in-memory implementations.
//!
//! This library provides:
//! - Provider-agnostic document operations over named collections
//! - A connection gateway with liveness probing and bounded reconnect
//! - Typed collection views doing serde conversion at the edge
//! - Query parsing with per-collection filter allow-lists
//!
//! ## Module Organization
//!
//! - [error] - Error types for all store operations
//! - [provider] - Provider types and configuration
//! - [client] - The provider trait, gateway, and handle
//! - [collection] - Typed views over named collections
//! - [query] - List query parsing and paging bounds
//! - [providers] - HTTP and in-memory provider implementations

// Module declarations
pub mod client;
pub mod collection;
pub mod error;
pub mod provider;
pub mod providers;
pub mod query;

// Re-export commonly used types at crate root for convenience
pub use client::{StoreClientFactory, StoreGateway, StoreHandle, StoreProvider, UpdateOutcome};
pub use collection::Collection;
pub use error::{ConfigurationError, QueryError, SerializationError, StoreError};
pub use provider::{HttpConfig, InMemoryConfig, ProviderConfig, ProviderType, StoreConfig};
pub use providers::{HttpProvider, InMemoryProvider};
pub use query::{filter_object, ParsedQuery, SortOrder, MAX_DATA_CHUNK};
