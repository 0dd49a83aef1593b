//! Shared fixtures for client tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wiremock::MockServer;

use crate::auth::{
    AuthenticationProvider, GitHubAppId, Installation, InstallationId, InstallationPermissions,
    InstallationToken, JsonWebToken,
};
use crate::client::{ClientConfig, GitHubClient, InstallationClient};
use crate::error::AuthError;

pub(crate) struct StaticAuthProvider {
    token: String,
}

impl StaticAuthProvider {
    pub(crate) fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl AuthenticationProvider for StaticAuthProvider {
    async fn generate_jwt(&self) -> Result<JsonWebToken, AuthError> {
        Ok(JsonWebToken::new(
            "test.jwt.token".to_string(),
            GitHubAppId::new(1),
            Utc::now() + chrono::Duration::minutes(10),
        ))
    }

    async fn get_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        Ok(InstallationToken::new(
            self.token.clone(),
            installation_id,
            Utc::now() + chrono::Duration::hours(1),
            InstallationPermissions::default(),
            Vec::new(),
        ))
    }

    async fn refresh_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        self.get_installation_token(installation_id).await
    }

    async fn get_org_installation(&self, org: &str) -> Result<Installation, AuthError> {
        Err(AuthError::InstallationNotFound {
            target: org.to_string(),
        })
    }
}

/// Installation client wired to a wiremock server with fast retries.
pub(crate) fn installation_client(server: &MockServer) -> InstallationClient {
    let config = ClientConfig {
        github_api_url: server.uri(),
        initial_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(10),
        ..ClientConfig::default()
    };
    let github_client = GitHubClient::builder(Arc::new(StaticAuthProvider::new("ghs_test")))
        .config(config)
        .build()
        .expect("client should build");
    github_client.installation(InstallationId::new(12345))
}
