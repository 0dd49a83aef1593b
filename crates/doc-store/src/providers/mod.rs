//! Document store provider implementations.
//!
//! This module contains concrete implementations of the [`StoreProvider`]
//! trait for different storage backends.
//!
//! [`StoreProvider`]: crate::client::StoreProvider

pub mod http;
pub mod memory;

pub use http::HttpProvider;
pub use memory::InMemoryProvider;
