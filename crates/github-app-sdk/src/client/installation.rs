//! Installation-scoped GitHub API client.
//!
//! The `InstallationClient` is bound to a specific installation ID and uses
//! installation tokens (not JWTs) for authentication. Domain operations for
//! check runs, comments and pull requests hang off this type in their own
//! modules.

use std::sync::Arc;

use tracing::debug;

use crate::auth::{InstallationId, InstallationToken};
use crate::client::{GitHubClient, RateLimitInfo, RetryPolicy};
use crate::error::ApiError;

/// Installation-scoped GitHub API client.
///
/// Holds a reference to the parent `GitHubClient` for the shared HTTP client
/// and auth provider. All operations use installation tokens.
#[derive(Debug, Clone)]
pub struct InstallationClient {
    /// Parent GitHub client (shared HTTP client and auth provider)
    client: Arc<GitHubClient>,
    /// Installation ID this client is bound to
    installation_id: InstallationId,
}

impl InstallationClient {
    /// Create a new installation client.
    pub fn new(client: Arc<GitHubClient>, installation_id: InstallationId) -> Self {
        Self {
            client,
            installation_id,
        }
    }

    /// Get the installation ID this client is bound to.
    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    async fn token(&self) -> Result<InstallationToken, ApiError> {
        self.client
            .auth_provider()
            .get_installation_token(self.installation_id)
            .await
            .map_err(|e| ApiError::TokenGenerationFailed {
                message: format!("Failed to obtain installation token: {}", e),
            })
    }

    fn url(&self, path: &str) -> String {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        format!("{}/{}", self.client.config().github_api_url, normalized)
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, ApiError> {
        let token = self.token().await?;
        let response = self
            .client
            .http_client()
            .get(url)
            .header("Authorization", format!("Bearer {}", token.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        Ok(response)
    }

    /// Make an authenticated GET request to the GitHub API.
    ///
    /// GETs are idempotent, so transient failures (connection errors, 5xx,
    /// secondary rate limits) are retried with exponential backoff. Other
    /// non-2xx responses are returned as-is for the caller to interpret.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let policy = RetryPolicy::from_config(self.client.config());
        let url = self.url(path);

        let mut attempt = 0;
        loop {
            let result = self.send_get(&url).await;

            let retry_in = match &result {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.is_server_error() {
                        let wait = RateLimitInfo::from_headers(response.headers())
                            .and_then(|info| info.retry_after())
                            .unwrap_or_else(|| policy.calculate_delay(attempt + 1));
                        Some(wait)
                    } else {
                        None
                    }
                }
                Err(err) if err.is_transient() => Some(policy.calculate_delay(attempt + 1)),
                Err(_) => None,
            };

            match retry_in {
                Some(wait) if policy.should_retry(attempt) => {
                    debug!(path, attempt, wait_ms = wait.as_millis() as u64, "retrying GitHub request");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                _ => return result,
            }
        }
    }

    /// Make an authenticated POST request to the GitHub API.
    ///
    /// Mutations are never retried here; replaying a create could duplicate
    /// the resource.
    pub async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.token().await?;
        let response = self
            .client
            .http_client()
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token.token()))
            .header("Accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Make an authenticated PUT request to the GitHub API.
    pub async fn put<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.token().await?;
        let response = self
            .client
            .http_client()
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token.token()))
            .header("Accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Make an authenticated PATCH request to the GitHub API.
    pub async fn patch<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.token().await?;
        let response = self
            .client
            .http_client()
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {}", token.token()))
            .header("Accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Make an authenticated DELETE request to the GitHub API.
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let token = self.token().await?;
        let response = self
            .client
            .http_client()
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod tests;
