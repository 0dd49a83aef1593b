//! Application configuration.
//!
//! Loaded once at startup from a YAML or JSON file, or from a JSON blob in
//! the `TRACKER_CONFIGURATION` environment variable, and validated before
//! anything binds a socket or signs a token. Secrets never appear in Debug
//! output.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use doc_store::{HttpConfig, InMemoryConfig, ProviderConfig, StoreConfig};

use crate::jobs::JobSettings;

// ============================================================================
// Configuration types
// ============================================================================

/// Complete tracker configuration.
///
/// Immutable after loading and validation; every long-lived component takes
/// its slice of this at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// GitHub App credentials and identity
    pub github: GitHubConfig,

    /// Document store backing the collections
    #[serde(default)]
    pub store: StoreSettings,

    /// Analytics ingestion endpoint
    pub analytics: AnalyticsConfig,

    /// Check run re-evaluation endpoint
    pub trigger: TriggerConfig,

    /// Application-level knobs
    #[serde(default)]
    pub app: AppConfig,
}

/// GitHub App credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Numeric GitHub App id
    pub app_id: u64,

    /// PEM-encoded RSA private key of the App
    pub private_key: String,

    /// Shared secret GitHub signs webhook deliveries with
    pub webhook_secret: String,

    /// Login the App's installation token acts as; sticky comments are
    /// recognized by this author
    #[serde(default = "default_bot_login")]
    pub bot_login: String,

    /// API base, overridable for GitHub Enterprise
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("app_id", &self.app_id)
            .field("private_key", &"<REDACTED>")
            .field("webhook_secret", &"<REDACTED>")
            .field("bot_login", &self.bot_login)
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn default_bot_login() -> String {
    "pr-time-tracker[bot]".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Which document store provider to use.
///
/// The in-memory provider keeps tests and local runs free of external
/// services; deployments point at the HTTP data API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum StoreSettings {
    InMemory(InMemoryConfig),
    Http(HttpConfig),
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::InMemory(InMemoryConfig::default())
    }
}

impl StoreSettings {
    /// Expand into the gateway configuration, with connection tuning left
    /// at its defaults.
    pub fn store_config(&self) -> StoreConfig {
        let provider = match self {
            Self::InMemory(config) => ProviderConfig::InMemory(config.clone()),
            Self::Http(config) => ProviderConfig::Http(config.clone()),
        };
        StoreConfig {
            provider,
            ..StoreConfig::default()
        }
    }
}

/// Analytics ingestion endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// URL rows are POSTed to
    pub ingest_url: String,

    /// Shared secret sent in the `x-analytics-secret` header
    pub secret: String,
}

impl fmt::Debug for AnalyticsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsConfig")
            .field("ingest_url", &self.ingest_url)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Check run re-evaluation endpoint, normally this service's own base URL.
#[derive(Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Base URL the `/api/trigger/check-run` path is appended to
    pub base_url: String,

    /// Shared secret sent in the `x-trigger-server-secret` header
    pub secret: String,
}

impl fmt::Debug for TriggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerConfig")
            .field("base_url", &self.base_url)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Application-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the contributor-facing app, used for check run details
    /// links
    #[serde(default = "default_details_url_base")]
    pub details_url_base: String,

    /// Contributor id granted the manager role on first sight
    #[serde(default)]
    pub bootstrap_manager_id: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            details_url_base: default_details_url_base(),
            bootstrap_manager_id: None,
        }
    }
}

fn default_details_url_base() -> String {
    "https://pr-time-tracker.vercel.app".to_string()
}

// ============================================================================
// Loading and validation
// ============================================================================

impl TrackerConfig {
    /// Load configuration from a file path.
    ///
    /// The extension picks the format; unknown extensions are tried as JSON
    /// first and YAML second.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: TrackerConfig = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                    message: format!("Invalid YAML: {e}"),
                })?
            }
            "json" => serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                message: format!("Invalid JSON: {e}"),
            })?,
            _ => serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| ConfigError::ParseError {
                    message: format!("Failed to parse as JSON or YAML: {e}"),
                })?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the `TRACKER_CONFIGURATION` environment
    /// variable, expected to hold a JSON document.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let config_str = std::env::var("TRACKER_CONFIGURATION").map_err(|_| {
            ConfigError::SourceUnavailable(
                "TRACKER_CONFIGURATION environment variable not set".to_string(),
            )
        })?;

        let config: TrackerConfig =
            serde_json::from_str(&config_str).map_err(|e| ConfigError::ParseError {
                message: format!("Invalid JSON in TRACKER_CONFIGURATION: {e}"),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate structure and constraints, collecting every problem rather
    /// than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.github.app_id == 0 {
            errors.push("github.app_id must be set".to_string());
        }
        if self.github.private_key.trim().is_empty() {
            errors.push("github.private_key must not be empty".to_string());
        }
        if self.github.webhook_secret.trim().is_empty() {
            errors.push("github.webhook_secret must not be empty".to_string());
        }
        if self.github.bot_login.trim().is_empty() {
            errors.push("github.bot_login must not be empty".to_string());
        }
        if !self.github.api_url.starts_with("http") {
            errors.push(format!(
                "github.api_url must be an http(s) URL, got '{}'",
                self.github.api_url
            ));
        }

        if let StoreSettings::Http(http) = &self.store {
            if !http.endpoint.starts_with("http") {
                errors.push(format!(
                    "store.endpoint must be an http(s) URL, got '{}'",
                    http.endpoint
                ));
            }
            if http.data_source.trim().is_empty() {
                errors.push("store.data_source must not be empty".to_string());
            }
            if http.database.trim().is_empty() {
                errors.push("store.database must not be empty".to_string());
            }
            if http.api_key.trim().is_empty() {
                errors.push("store.api_key must not be empty".to_string());
            }
        }

        if !self.analytics.ingest_url.starts_with("http") {
            errors.push(format!(
                "analytics.ingest_url must be an http(s) URL, got '{}'",
                self.analytics.ingest_url
            ));
        }
        if self.analytics.secret.trim().is_empty() {
            errors.push("analytics.secret must not be empty".to_string());
        }

        if !self.trigger.base_url.starts_with("http") {
            errors.push(format!(
                "trigger.base_url must be an http(s) URL, got '{}'",
                self.trigger.base_url
            ));
        }
        if self.trigger.secret.trim().is_empty() {
            errors.push("trigger.secret must not be empty".to_string());
        }

        if !self.app.details_url_base.starts_with("http") {
            errors.push(format!(
                "app.details_url_base must be an http(s) URL, got '{}'",
                self.app.details_url_base
            ));
        }

        if !errors.is_empty() {
            return Err(ConfigError::ValidationError { errors });
        }
        Ok(())
    }

    /// Job layer settings derived from this configuration; debounce timing
    /// keeps its production defaults.
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            bot_login: self.github.bot_login.clone(),
            details_url_base: self.app.details_url_base.clone(),
            bootstrap_manager_id: self.app.bootstrap_manager_id,
            ..JobSettings::default()
        }
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Configuration validation failed: {errors:?}")]
    ValidationError { errors: Vec<String> },

    #[error("Configuration source unavailable: {0}")]
    SourceUnavailable(String),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
