//! Update configuration with builder pattern
//!
//! Groups batch sizing, retry budget, admission limits and rate-limit backoff
//! into one value with sane defaults.

use crate::error::UpdateError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single bulk update run
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub concurrency_limit: usize,
    pub backoff: BackoffConfig,
}

/// What a concurrent batch task does with its admission slot while it
/// sleeps off a 429
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermitPolicy {
    /// Keep the slot, so backoff also throttles sibling batches
    #[default]
    HoldDuringBackoff,
    /// Give the slot back and re-acquire it before the next attempt
    ReleaseDuringBackoff,
}

/// Rate-limit backoff configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Wait used when `Retry-After` is missing or unparsable
    pub default_retry_after: Duration,
    /// Fixed extra delay added on top of every wait
    pub jitter: Duration,
    pub permit_policy: PermitPolicy,
    /// Minimum spacing between coalesced rate-limit notices
    pub notice_window: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_retries: 3,
            concurrency_limit: 4,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            default_retry_after: Duration::from_secs(1),
            jitter: Duration::from_millis(250),
            permit_policy: PermitPolicy::HoldDuringBackoff,
            notice_window: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Server-suggested wait (or the default) before jitter
    pub fn wait_for(&self, retry_after_secs: Option<u64>) -> Duration {
        retry_after_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }

    /// Full sleep duration for a 429 carrying `retry_after_secs`
    pub fn delay_for(&self, retry_after_secs: Option<u64>) -> Duration {
        self.wait_for(retry_after_secs) + self.jitter
    }
}

impl UpdateConfig {
    pub fn builder() -> UpdateConfigBuilder {
        UpdateConfigBuilder::new()
    }

    /// Fewer parallel requests and a larger retry budget, for accounts that
    /// hit the rate limit often
    pub fn conservative() -> Self {
        Self {
            batch_size: 10,
            max_retries: 5,
            concurrency_limit: 2,
            backoff: BackoffConfig {
                jitter: Duration::from_millis(500),
                ..BackoffConfig::default()
            },
        }
    }

    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.batch_size == 0 {
            return Err(UpdateError::configuration("batch size must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(UpdateError::configuration("max retries must be at least 1"));
        }
        if self.concurrency_limit == 0 {
            return Err(UpdateError::configuration("concurrency limit must be at least 1"));
        }
        Ok(())
    }
}

/// Builder for UpdateConfig
#[derive(Debug)]
pub struct UpdateConfigBuilder {
    config: UpdateConfig,
}

impl UpdateConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: UpdateConfig::default(),
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.config.max_retries = attempts;
        self
    }

    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    pub fn backoff_config(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn default_retry_after(mut self, wait: Duration) -> Self {
        self.config.backoff.default_retry_after = wait;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.backoff.jitter = jitter;
        self
    }

    pub fn permit_policy(mut self, policy: PermitPolicy) -> Self {
        self.config.backoff.permit_policy = policy;
        self
    }

    pub fn notice_window(mut self, window: Duration) -> Self {
        self.config.backoff.notice_window = window;
        self
    }

    pub fn build(self) -> UpdateConfig {
        self.config
    }
}

impl Default for UpdateConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UpdateConfig::default();

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.backoff.jitter, Duration::from_millis(250));
        assert_eq!(config.backoff.permit_policy, PermitPolicy::HoldDuringBackoff);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_delay_uses_server_wait_or_default() {
        let backoff = BackoffConfig::default();

        assert_eq!(backoff.delay_for(Some(3)), Duration::from_millis(3250));
        assert_eq!(backoff.delay_for(None), Duration::from_millis(1250));
        assert_eq!(backoff.wait_for(Some(0)), Duration::ZERO);
    }

    #[test]
    fn test_builder_pattern() {
        let config = UpdateConfig::builder()
            .batch_size(25)
            .max_retries(5)
            .concurrency_limit(8)
            .jitter(Duration::ZERO)
            .permit_policy(PermitPolicy::ReleaseDuringBackoff)
            .build();

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(config.backoff.jitter, Duration::ZERO);
        assert_eq!(config.backoff.permit_policy, PermitPolicy::ReleaseDuringBackoff);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        for config in [
            UpdateConfig::builder().batch_size(0).build(),
            UpdateConfig::builder().max_retries(0).build(),
            UpdateConfig::builder().concurrency_limit(0).build(),
        ] {
            let error = config.validate().unwrap_err();
            assert!(error.is_configuration());
        }
    }

    #[test]
    fn test_permit_policy_serde_names() {
        let policy: PermitPolicy = serde_json::from_str("\"release-during-backoff\"").unwrap();
        assert_eq!(policy, PermitPolicy::ReleaseDuringBackoff);
    }
}
