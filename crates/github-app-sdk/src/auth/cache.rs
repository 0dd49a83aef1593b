//! Token caching implementation for GitHub App authentication.
//!
//! Provides thread-safe caching for JWT and installation tokens. Tokens are
//! held for the process lifetime and dropped once expired; reads never
//! return an expired token.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{GitHubAppId, InstallationId, InstallationToken, JsonWebToken, TokenCache};
use crate::error::CacheError;

/// In-memory token cache.
///
/// Backs the authenticator's per-installation token reuse. One entry per
/// installation id, one JWT entry per app id.
pub struct InMemoryTokenCache {
    jwt_cache: RwLock<HashMap<GitHubAppId, CachedToken<JsonWebToken>>>,
    installation_cache: RwLock<HashMap<InstallationId, CachedToken<InstallationToken>>>,
}

/// Cached token wrapper.
struct CachedToken<T> {
    token: T,
}

impl<T: TokenExpiry> CachedToken<T> {
    fn new(token: T) -> Self {
        Self { token }
    }

    fn live(&self) -> Option<&T> {
        if self.token.is_expired() {
            None
        } else {
            Some(&self.token)
        }
    }

    fn is_valid(&self) -> bool {
        !self.token.is_expired()
    }
}

/// Trait for tokens that have expiration.
trait TokenExpiry {
    fn is_expired(&self) -> bool;
}

impl TokenExpiry for JsonWebToken {
    fn is_expired(&self) -> bool {
        self.is_expired()
    }
}

impl TokenExpiry for InstallationToken {
    fn is_expired(&self) -> bool {
        self.is_expired()
    }
}

impl InMemoryTokenCache {
    /// Create a new in-memory token cache.
    pub fn new() -> Self {
        Self {
            jwt_cache: RwLock::new(HashMap::new()),
            installation_cache: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_error(context: &str, err: impl std::fmt::Display) -> CacheError {
    CacheError::OperationFailed {
        message: format!("{}: {}", context, err),
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get_jwt(&self, app_id: GitHubAppId) -> Result<Option<JsonWebToken>, CacheError> {
        let cache = self
            .jwt_cache
            .read()
            .map_err(|e| lock_error("Failed to acquire JWT read lock", e))?;

        Ok(cache
            .get(&app_id)
            .and_then(|cached| cached.live())
            .cloned())
    }

    async fn store_jwt(&self, jwt: JsonWebToken) -> Result<(), CacheError> {
        let mut cache = self
            .jwt_cache
            .write()
            .map_err(|e| lock_error("Failed to acquire JWT write lock", e))?;

        cache.insert(jwt.app_id(), CachedToken::new(jwt));
        Ok(())
    }

    async fn get_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<Option<InstallationToken>, CacheError> {
        let cache = self
            .installation_cache
            .read()
            .map_err(|e| lock_error("Failed to acquire installation read lock", e))?;

        Ok(cache
            .get(&installation_id)
            .and_then(|cached| cached.live())
            .cloned())
    }

    async fn store_installation_token(&self, token: InstallationToken) -> Result<(), CacheError> {
        let mut cache = self
            .installation_cache
            .write()
            .map_err(|e| lock_error("Failed to acquire installation write lock", e))?;

        cache.insert(token.installation_id(), CachedToken::new(token));
        Ok(())
    }

    async fn invalidate_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<(), CacheError> {
        let mut cache = self
            .installation_cache
            .write()
            .map_err(|e| lock_error("Failed to acquire installation write lock", e))?;

        cache.remove(&installation_id);
        Ok(())
    }

    fn cleanup_expired_tokens(&self) {
        if let Ok(mut jwt_cache) = self.jwt_cache.write() {
            jwt_cache.retain(|_, cached| cached.is_valid());
        }

        if let Ok(mut inst_cache) = self.installation_cache.write() {
            inst_cache.retain(|_, cached| cached.is_valid());
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
