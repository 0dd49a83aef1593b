//! # GitHub App SDK
//!
//! Software Development Kit for GitHub App integration with App
//! authentication, API client abstractions, and webhook processing.
//!
//! This SDK provides:
//! - GitHub App authentication with JWT and installation tokens
//! - Installation-scoped API client with rate limiting and retry logic
//! - Check run, issue comment, and pull request operations
//! - Webhook signature validation and typed event payloads
//!
//! # Examples
//!
//! ## Working with Identifiers
//!
//! ```rust
//! use github_app_sdk::auth::{GitHubAppId, InstallationId};
//!
//! let app_id = GitHubAppId::new(123456);
//! let installation_id = InstallationId::new(789012);
//!
//! assert_eq!(installation_id.as_u64(), 789012);
//! ```
//!
//! ## Working with Tokens
//!
//! ```rust
//! use github_app_sdk::auth::{GitHubAppId, JsonWebToken};
//! use chrono::{Duration, Utc};
//!
//! let app_id = GitHubAppId::new(123);
//! let expires_at = Utc::now() + Duration::minutes(10);
//! let jwt = JsonWebToken::new("token".to_string(), app_id, expires_at);
//!
//! if jwt.expires_soon(Duration::minutes(5)) {
//!     println!("Token expires soon, should refresh");
//! }
//! ```
//!
//! ## Decoding Webhook Deliveries
//!
//! ```rust
//! use github_app_sdk::events::WebhookEvent;
//!
//! let body = br#"{"zen": "Keep it logically awesome."}"#;
//! let event = WebhookEvent::parse("ping", body).unwrap();
//!
//! assert_eq!(event.event_name(), "ping");
//! ```

// Public modules
pub mod auth;
pub mod client;
pub mod error;
pub mod events;
pub mod webhook;

// Re-export commonly used types at crate root for convenience
pub use error::{ApiError, AuthError, CacheError, EventError, SecretError, ValidationError};

pub use auth::{
    AppAuthenticator, AuthConfig, AuthenticationProvider, GitHubAppId, Installation,
    InstallationId, InstallationToken, JsonWebToken, PrivateKey, RepositoryId, SecretProvider,
    StaticSecretProvider, TokenCache, UserId, UserType,
};

pub use client::{ClientConfig, GitHubClient, GitHubClientBuilder, InstallationClient};

pub use events::WebhookEvent;

pub use webhook::SignatureValidator;
