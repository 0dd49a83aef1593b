//! Rate limit tracking and retry policy for GitHub API calls.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::ClientConfig;

/// Rate limit information from GitHub API response headers.
///
/// GitHub reports the primary rate limit in:
/// - X-RateLimit-Limit
/// - X-RateLimit-Remaining
/// - X-RateLimit-Reset (Unix timestamp)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Maximum number of requests allowed
    pub limit: u64,

    /// Number of requests remaining
    pub remaining: u64,

    /// Time when the rate limit resets
    pub reset_at: DateTime<Utc>,

    /// Whether currently rate limited
    pub is_limited: bool,
}

impl RateLimitInfo {
    /// Parse rate limit info from response headers.
    ///
    /// Returns `None` when any of the three headers is missing or malformed.
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Option<Self> {
        let header_value = |name: &str| headers.get(name)?.to_str().ok();

        let limit = header_value("x-ratelimit-limit")?.parse::<u64>().ok()?;
        let remaining = header_value("x-ratelimit-remaining")?.parse::<u64>().ok()?;
        let reset_timestamp = header_value("x-ratelimit-reset")?.parse::<i64>().ok()?;

        let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;
        let is_limited = remaining == 0;

        Some(RateLimitInfo {
            limit,
            remaining,
            reset_at,
            is_limited,
        })
    }

    /// Check if remaining requests are below the given fraction of the limit.
    pub fn is_near_limit(&self, threshold_pct: f64) -> bool {
        let threshold = (self.limit as f64 * threshold_pct) as u64;
        self.remaining < threshold
    }

    /// Get time until rate limit reset.
    pub fn time_until_reset(&self) -> Duration {
        let now = Utc::now();
        if self.reset_at > now {
            Duration::from_secs((self.reset_at - now).num_seconds() as u64)
        } else {
            Duration::from_secs(0)
        }
    }

    /// Delay to wait before retrying, if the limit is exhausted.
    pub fn retry_after(&self) -> Option<Duration> {
        if self.is_limited {
            Some(self.time_until_reset())
        } else {
            None
        }
    }
}

/// Retry policy for transient errors.
///
/// Controls exponential backoff retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 for doubling)
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom settings.
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }

    /// Build the policy from client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_retry_delay,
            config.max_retry_delay,
        )
    }

    /// Enable jitter (random variation) in retry delays.
    ///
    /// Adds plus or minus 25% randomization so simultaneous retries
    /// spread out.
    pub fn with_jitter(mut self) -> Self {
        self.use_jitter = true;
        self
    }

    /// Disable jitter in retry delays.
    ///
    /// Use this for deterministic testing or when precise timing is required.
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Calculate delay for a specific retry attempt.
    ///
    /// Attempt 0 has no delay; later attempts back off exponentially and are
    /// capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay_ms = (self.initial_delay.as_millis() as f64 * multiplier) as u64;
        let mut delay = Duration::from_millis(delay_ms);

        if delay > self.max_delay {
            delay = self.max_delay;
        }

        if self.use_jitter {
            use rand::RngExt;
            let jitter_factor = rand::rng().random_range(0.75..=1.25);
            delay = Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
        }

        delay
    }

    /// Check if another retry attempt should be made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
