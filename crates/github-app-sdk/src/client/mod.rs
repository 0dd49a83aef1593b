//! GitHub API client for authenticated operations.
//!
//! `GitHubClient` makes app-level calls (JWT) and hands out installation-scoped
//! clients (installation tokens) for repository work. The installation client
//! carries the domain operations the tracker needs: check runs, issue comments
//! and pull request lookups.

mod checks;
mod comments;
mod installation;
mod pagination;
mod pulls;
mod retry;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticationProvider, Installation, InstallationId, UserType};
use crate::error::{ApiError, AuthError};

pub use checks::{
    CheckRun, CheckRunConclusion, CheckRunOutput, CheckRunPullRef, CheckRunStatus, CheckSuiteRef,
    CreateCheckRunRequest, ReportedOutput, UpdateCheckRunRequest,
};
pub use comments::{Comment, CommentAuthorFilter, CreateCommentRequest, UpdateCommentRequest};
pub use installation::InstallationClient;
pub use pagination::{parse_link_header, Pagination};
pub use pulls::{PullRequest, PullRequestBranch, TeamRef};
pub use retry::{RateLimitInfo, RetryPolicy};

/// Actor attached to comments, pull requests and reviews.
///
/// GitHub renders the same user shape on every resource; one type covers
/// them all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Account identifier
    pub id: u64,

    /// Login name, `[bot]`-suffixed for app accounts
    pub login: String,

    /// Account class
    #[serde(rename = "type", default)]
    pub user_type: UserType,

    /// Profile page URL
    #[serde(default)]
    pub html_url: Option<String>,

    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Configuration for GitHub API client behavior.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests (required by GitHub)
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Base delay for exponential backoff retries
    pub initial_retry_delay: Duration,
    /// Maximum delay between retries
    pub max_retry_delay: Duration,
    /// GitHub API base URL
    pub github_api_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "pr-time-tracker/0.1.0".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(60),
            github_api_url: "https://api.github.com".to_string(),
        }
    }
}

impl ClientConfig {
    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the GitHub API base URL.
    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into();
        self
    }
}

/// GitHub API client for authenticated operations.
///
/// Cloning is cheap; the HTTP connection pool and auth provider are shared.
#[derive(Clone)]
pub struct GitHubClient {
    auth: Arc<dyn AuthenticationProvider>,
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl GitHubClient {
    /// Create a new builder for constructing a GitHub client.
    pub fn builder(auth: Arc<dyn AuthenticationProvider>) -> GitHubClientBuilder {
        GitHubClientBuilder::new(auth)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the authentication provider.
    pub fn auth_provider(&self) -> &dyn AuthenticationProvider {
        self.auth.as_ref()
    }

    /// Get the HTTP client (internal use by InstallationClient).
    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Create a client bound to a known installation.
    pub fn installation(&self, installation_id: InstallationId) -> InstallationClient {
        InstallationClient::new(Arc::new(self.clone()), installation_id)
    }

    /// Resolve the App installation for an organization.
    pub async fn org_installation(&self, org: &str) -> Result<Installation, ApiError> {
        self.auth
            .get_org_installation(org)
            .await
            .map_err(auth_error_to_api)
    }

    /// Create a client bound to the installation covering an organization.
    pub async fn for_org(&self, org: &str) -> Result<InstallationClient, ApiError> {
        let installation = self.org_installation(org).await?;
        Ok(self.installation(installation.id))
    }

    /// Make a raw authenticated GET request as the GitHub App.
    ///
    /// Non-2xx responses are returned as-is; the caller checks the status.
    pub async fn get_as_app(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let jwt = self.auth.generate_jwt().await.map_err(|e| {
            ApiError::TokenGenerationFailed {
                message: format!("Failed to generate JWT: {}", e),
            }
        })?;

        let normalized_path = path.strip_prefix('/').unwrap_or(path);
        let url = format!("{}/{}", self.config.github_api_url, normalized_path);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", jwt.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        Ok(response)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("config", &self.config)
            .field("auth", &"<AuthenticationProvider>")
            .finish()
    }
}

/// Builder for constructing `GitHubClient` instances.
pub struct GitHubClientBuilder {
    auth: Arc<dyn AuthenticationProvider>,
    config: Option<ClientConfig>,
}

impl GitHubClientBuilder {
    fn new(auth: Arc<dyn AuthenticationProvider>) -> Self {
        Self { auth, config: None }
    }

    /// Set the client configuration.
    ///
    /// If not set, uses `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the GitHub client.
    pub fn build(self) -> Result<GitHubClient, ApiError> {
        let config = self.config.unwrap_or_default();

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(GitHubClient {
            auth: self.auth,
            http_client,
            config,
        })
    }
}

/// Convert a non-success response into the matching `ApiError`.
///
/// Consumes the response body for the error message.
pub(crate) async fn read_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    ApiError::from_status(status, message)
}

fn auth_error_to_api(err: AuthError) -> ApiError {
    match err {
        AuthError::InstallationNotFound { .. } => ApiError::NotFound,
        AuthError::Api(inner) => inner,
        other => ApiError::TokenGenerationFailed {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
