//! GitHub App authenticator.
//!
//! Exchanges the App's private key for short-lived JWTs and per-installation
//! access tokens, caching both. Organization installations are resolved once
//! and remembered for the process lifetime, so webhook jobs for the same org
//! do not repeat the lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    AuthenticationProvider, GitHubApiClient, GitHubAppId, Installation, InstallationId,
    InstallationPermissions, InstallationToken, JsonWebToken, RepositoryId, SecretProvider,
    TokenCache,
};
use crate::auth::jwt::{JwtGenerator, RS256JwtGenerator};
use crate::error::{ApiError, AuthError, CacheError};

// ============================================================================
// Configuration
// ============================================================================

/// Authentication tuning knobs.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Lifetime of generated JWTs (max 10 minutes).
    pub jwt_expiration: Duration,

    /// Regenerate the JWT when it expires within this margin.
    pub jwt_refresh_margin: Duration,

    /// Refresh installation tokens when they expire within this margin.
    pub token_refresh_margin: Duration,

    /// Base URL for the GitHub API.
    pub github_api_url: String,

    /// User-Agent header for API requests.
    pub user_agent: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_expiration: Duration::minutes(10),
            jwt_refresh_margin: Duration::minutes(2),
            token_refresh_margin: Duration::minutes(5),
            github_api_url: "https://api.github.com".to_string(),
            user_agent: "pr-time-tracker/0.1.0".to_string(),
        }
    }
}

// ============================================================================
// HTTP API Client
// ============================================================================

/// Reqwest-backed implementation of the authentication API calls.
#[derive(Debug, Clone)]
pub struct HttpGitHubApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGitHubApiClient {
    /// Create a client against the configured API base URL.
    pub fn new(config: &AuthConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.github_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    permissions: InstallationPermissions,
    #[serde(default)]
    repositories: Vec<TokenRepository>,
}

#[derive(Debug, Deserialize)]
struct TokenRepository {
    id: u64,
}

#[async_trait::async_trait]
impl GitHubApiClient for HttpGitHubApiClient {
    async fn create_installation_access_token(
        &self,
        installation_id: InstallationId,
        jwt: &JsonWebToken,
    ) -> Result<InstallationToken, ApiError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.base_url,
            installation_id.as_u64()
        );

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", jwt.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        let body: AccessTokenResponse = response.json().await.map_err(ApiError::from)?;
        let repositories = body
            .repositories
            .iter()
            .map(|r| RepositoryId::new(r.id))
            .collect();

        Ok(InstallationToken::new(
            body.token,
            installation_id,
            body.expires_at,
            body.permissions,
            repositories,
        ))
    }

    async fn get_org_installation(
        &self,
        org: &str,
        jwt: &JsonWebToken,
    ) -> Result<Installation, ApiError> {
        let url = format!("{}/orgs/{}/installation", self.base_url, org);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", jwt.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        response.json().await.map_err(ApiError::from)
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// GitHub App authentication provider.
///
/// The App id and private key are resolved once at construction and fixed
/// for the process lifetime.
pub struct AppAuthenticator {
    app_id: GitHubAppId,
    jwt_generator: RS256JwtGenerator,
    api: Arc<dyn GitHubApiClient>,
    cache: Arc<dyn TokenCache>,
    config: AuthConfig,
    org_installations: RwLock<HashMap<String, Installation>>,
}

impl AppAuthenticator {
    /// Build an authenticator from its collaborators.
    pub async fn new(
        secrets: Arc<dyn SecretProvider>,
        api: Arc<dyn GitHubApiClient>,
        cache: Arc<dyn TokenCache>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        if config.jwt_expiration > Duration::minutes(10) {
            return Err(AuthError::JwtGenerationFailed {
                message: "JWT expiration cannot exceed 10 minutes".to_string(),
            });
        }

        let app_id = secrets.get_app_id().await?;
        let private_key = secrets.get_private_key().await?;
        let jwt_generator = RS256JwtGenerator::with_expiration(private_key, config.jwt_expiration);

        Ok(Self {
            app_id,
            jwt_generator,
            api,
            cache,
            config,
            org_installations: RwLock::new(HashMap::new()),
        })
    }

    /// The App id this authenticator signs for.
    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    fn lock_error(err: impl std::fmt::Display) -> AuthError {
        AuthError::Cache(CacheError::OperationFailed {
            message: format!("org installation lock failed: {}", err),
        })
    }
}

#[async_trait::async_trait]
impl AuthenticationProvider for AppAuthenticator {
    async fn generate_jwt(&self) -> Result<JsonWebToken, AuthError> {
        if let Some(jwt) = self.cache.get_jwt(self.app_id).await? {
            if !jwt.expires_soon(self.config.jwt_refresh_margin) {
                return Ok(jwt);
            }
        }

        let jwt = self.jwt_generator.generate_jwt(self.app_id).await?;
        self.cache.store_jwt(jwt.clone()).await?;
        debug!(app_id = %self.app_id, "generated new app JWT");

        Ok(jwt)
    }

    async fn get_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        if let Some(token) = self.cache.get_installation_token(installation_id).await? {
            if !token.expires_soon(self.config.token_refresh_margin) {
                return Ok(token);
            }
        }

        self.refresh_installation_token(installation_id).await
    }

    async fn refresh_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let jwt = self.generate_jwt().await?;
        let token = self
            .api
            .create_installation_access_token(installation_id, &jwt)
            .await?;

        self.cache.store_installation_token(token.clone()).await?;
        info!(
            installation_id = %installation_id,
            expires_at = %token.expires_at(),
            "created installation token"
        );

        Ok(token)
    }

    async fn get_org_installation(&self, org: &str) -> Result<Installation, AuthError> {
        {
            let cache = self
                .org_installations
                .read()
                .map_err(Self::lock_error)?;
            if let Some(installation) = cache.get(org) {
                return Ok(installation.clone());
            }
        }

        let jwt = self.generate_jwt().await?;
        let installation = match self.api.get_org_installation(org, &jwt).await {
            Ok(installation) => installation,
            Err(ApiError::NotFound) => {
                return Err(AuthError::InstallationNotFound {
                    target: org.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let mut cache = self
            .org_installations
            .write()
            .map_err(Self::lock_error)?;
        cache.insert(org.to_string(), installation.clone());

        Ok(installation)
    }
}

// Security: collaborators may hold key material
impl std::fmt::Debug for AppAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppAuthenticator")
            .field("app_id", &self.app_id)
            .field("config", &self.config)
            .field("jwt_generator", &"<RS256JwtGenerator>")
            .finish()
    }
}

#[cfg(test)]
#[path = "app_auth_tests.rs"]
mod tests;
