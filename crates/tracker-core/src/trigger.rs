//! Check-run re-evaluation handoff.
//!
//! A check run that already exists cannot be re-driven from inside the job
//! that noticed it; the re-evaluation is handed to the service's trigger
//! endpoint, which spawns it as a fresh job. The handoff is a plain HTTP
//! POST guarded by a shared secret, so the submission API can use the same
//! path to re-drive a check after hours are recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::JobError;

/// Header carrying the shared trigger secret.
pub const TRIGGER_SECRET_HEADER: &str = "x-trigger-server-secret";

/// Which check-run family to re-evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunKind {
    Submission,
    BugReport,
}

/// Payload of a check-run re-evaluation request.
///
/// `check_run_id` and `pr_id` are present when the caller already resolved
/// them (the list-before-create path); the submission API omits them and the
/// handler re-resolves the check run by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRunTrigger {
    #[serde(rename = "type")]
    pub kind: CheckRunKind,

    pub organization: String,

    pub repo: String,

    pub sender_login: String,

    pub sender_id: u64,

    pub pr_number: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_run_id: Option<u64>,
}

/// Client side of the trigger endpoint.
#[derive(Clone)]
pub struct TriggerClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl TriggerClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            secret: secret.into(),
        }
    }

    /// Ask the service to re-evaluate a check run.
    pub async fn request_check_run(&self, trigger: &CheckRunTrigger) -> Result<(), JobError> {
        let url = format!("{}/api/trigger/check-run", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header(TRIGGER_SECRET_HEADER, &self.secret)
            .json(trigger)
            .send()
            .await
            .map_err(|e| JobError::Trigger {
                message: format!("trigger request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(JobError::Trigger {
                message: format!("trigger endpoint answered {}", response.status()),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for TriggerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerClient")
            .field("base_url", &self.base_url)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
