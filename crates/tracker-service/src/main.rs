//! # PR Time Tracker Service
//!
//! Binary entry point for the pr-time-tracker HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Initializes logging
//! - Wires the document store, GitHub client, analytics sink and trigger
//!   client into the job context
//! - Starts the HTTP server from tracker-api

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_store::StoreGateway;
use github_app_sdk::auth::{
    AppAuthenticator, AuthConfig, GitHubAppId, HttpGitHubApiClient, InMemoryTokenCache,
    SecretProvider, StaticSecretProvider,
};
use github_app_sdk::client::{ClientConfig, GitHubClient};
use github_app_sdk::webhook::SignatureValidator;
use tracker_api::{start_server, AppState, ServiceConfig, ServiceError};
use tracker_core::{AnalyticsSink, HttpSink, JobContext, Repositories, TriggerClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tracker_service=info,tracker_api=info,tracker_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PR Time Tracker Service");

    let service_config = load_configuration();

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Wire the shared components
    //
    // Everything long-lived is built here, once: the store gateway, the
    // authenticated GitHub client, the analytics sink and the trigger
    // client. Jobs and request handlers receive them through the JobContext
    // and never construct their own.
    // -------------------------------------------------------------------------
    let github_config = service_config.tracker.github.clone();

    let store = Arc::new(StoreGateway::new(
        service_config.tracker.store.store_config(),
    ));

    let secrets: Arc<dyn SecretProvider> = Arc::new(StaticSecretProvider::new(
        GitHubAppId::new(github_config.app_id),
        github_config.private_key.clone(),
        github_config.webhook_secret.clone(),
    ));

    let auth_config = AuthConfig {
        github_api_url: github_config.api_url.clone(),
        ..AuthConfig::default()
    };
    let api = match HttpGitHubApiClient::new(&auth_config) {
        Ok(api) => api,
        Err(e) => {
            error!(error = %e, "Failed to build the GitHub HTTP client; aborting");
            std::process::exit(3);
        }
    };
    let authenticator = match AppAuthenticator::new(
        Arc::clone(&secrets),
        Arc::new(api),
        Arc::new(InMemoryTokenCache::new()),
        auth_config,
    )
    .await
    {
        Ok(authenticator) => authenticator,
        Err(e) => {
            error!(error = %e, "GitHub App authentication setup failed; aborting");
            std::process::exit(3);
        }
    };

    let client_config = ClientConfig {
        github_api_url: github_config.api_url.clone(),
        ..ClientConfig::default()
    };
    let github = match GitHubClient::builder(Arc::new(authenticator))
        .config(client_config)
        .build()
    {
        Ok(github) => github,
        Err(e) => {
            error!(error = %e, "Failed to build the GitHub client; aborting");
            std::process::exit(3);
        }
    };

    let sink: Arc<dyn AnalyticsSink> = Arc::new(HttpSink::new(
        reqwest::Client::new(),
        service_config.tracker.analytics.ingest_url.clone(),
        service_config.tracker.analytics.secret.clone(),
    ));
    let trigger = TriggerClient::new(
        reqwest::Client::new(),
        service_config.tracker.trigger.base_url.clone(),
        service_config.tracker.trigger.secret.clone(),
    );

    let ctx = JobContext::new(
        Arc::clone(&store),
        github,
        sink,
        trigger,
        service_config.tracker.job_settings(),
    );
    let validator = SignatureValidator::new(secrets);
    let state = AppState::new(
        ctx,
        Arc::clone(&store),
        validator,
        service_config.tracker.trigger.secret.clone(),
    );

    // -------------------------------------------------------------------------
    // Probe the document store before binding
    //
    // A service that cannot reach its store would answer every request with
    // a 5xx anyway; failing fast surfaces a misconfigured deployment in the
    // process exit code instead of in request logs.
    // -------------------------------------------------------------------------
    match store.acquire().await {
        Ok(handle) => {
            if let Err(e) = handle.ping().await {
                error!(error = %e, "Document store ping failed; aborting");
                std::process::exit(4);
            }
            Repositories::new(&handle, service_config.tracker.app.bootstrap_manager_id)
                .ensure_indexes()
                .await;
        }
        Err(e) => {
            error!(error = %e, "Could not connect to the document store; aborting");
            std::process::exit(4);
        }
    }

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    // Start the server
    if let Err(e) = start_server(service_config, state).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
            ServiceError::HealthCheckFailed { .. } => 4,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

/// Load the service configuration, exiting with code 3 on any failure.
///
/// Sources (applied in order; later sources override earlier ones):
///  1. `TRACKER_CONFIGURATION` env var        - the whole configuration as
///     one JSON document, the shape serverless deployments inject; when
///     set, no other source is consulted
///  2. `/etc/pr-time-tracker/service.yaml`    - system-wide defaults
///  3. `./config/service.yaml`                - deployment-local override
///  4. Path given by `TRACKER_CONFIG_FILE`    - operator-specified file
///  5. Environment variables prefixed `PTT__` (double-underscore separator)
///     e.g. `PTT__SERVER__PORT=9090` sets `server.port = 9090`
///
/// The server section carries serde defaults, but the domain sections do
/// not: a deployment without GitHub App credentials, an analytics endpoint
/// and a trigger secret cannot do anything useful, so their absence is a
/// hard error.
fn load_configuration() -> ServiceConfig {
    if let Ok(blob) = std::env::var("TRACKER_CONFIGURATION") {
        if !blob.is_empty() {
            info!("Loading configuration from TRACKER_CONFIGURATION");
            match serde_json::from_str(&blob) {
                Ok(config) => return config,
                Err(e) => {
                    error!(
                        error = %e,
                        "Invalid JSON in TRACKER_CONFIGURATION; aborting. \
                         Fix the configuration and restart."
                    );
                    std::process::exit(3);
                }
            }
        }
    }

    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/pr-time-tracker/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("TRACKER_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("PTT").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    }
}
