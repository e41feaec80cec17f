//! Integration tests for the resilience layer
//!
//! Covers update config presets and builder, config-file settings, the
//! admission limiter, and coalesced retry notices working together.

use copper_cli::api::resilience::{
    AdmissionLimiter, BackoffConfig, PermitPolicy, ResponseClass, RetryController, UpdateConfig,
    parse_retry_after,
};
use copper_cli::config::Config;
use std::io::Write;
use std::time::Duration;

/// Test that UpdateConfig can be built with all components
#[test]
fn test_update_config_builder_integration() {
    let config = UpdateConfig::builder()
        .batch_size(25)
        .max_retries(5)
        .concurrency_limit(8)
        .default_retry_after(Duration::from_secs(3))
        .jitter(Duration::from_millis(100))
        .permit_policy(PermitPolicy::ReleaseDuringBackoff)
        .notice_window(Duration::from_millis(500))
        .build();

    assert_eq!(config.batch_size, 25);
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.concurrency_limit, 8);
    assert_eq!(config.backoff.wait_for(None), Duration::from_secs(3));
    assert_eq!(config.backoff.delay_for(Some(2)), Duration::from_millis(2100));
    assert_eq!(config.backoff.permit_policy, PermitPolicy::ReleaseDuringBackoff);
    assert!(config.validate().is_ok());
}

/// Test different presets work correctly
#[test]
fn test_update_config_presets() {
    let default_config = UpdateConfig::default();
    assert_eq!(default_config.batch_size, 10);
    assert_eq!(default_config.max_retries, 3);
    assert_eq!(default_config.concurrency_limit, 4);
    assert_eq!(default_config.backoff, BackoffConfig::default());
    assert_eq!(default_config.backoff.permit_policy, PermitPolicy::HoldDuringBackoff);

    let conservative = UpdateConfig::conservative();
    assert!(conservative.concurrency_limit < default_config.concurrency_limit);
    assert!(conservative.max_retries > default_config.max_retries);
    assert!(conservative.validate().is_ok());
}

/// Test that the `[update]` table of the config file drives the engine
#[test]
fn test_config_file_to_update_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[api]
base_url = "http://localhost:9999/v1"

[update]
mode = "concurrent"
batch_size = 5
max_retries = 2
concurrency_limit = 1
jitter_ms = 0
default_retry_after_secs = 4
"#
    )
    .unwrap();

    let config = Config::load_from(file.path()).unwrap();
    assert_eq!(config.api.base_url, "http://localhost:9999/v1");

    let update = config.update.to_update_config();
    assert_eq!(update.batch_size, 5);
    assert_eq!(update.max_retries, 2);
    assert_eq!(update.concurrency_limit, 1);
    assert_eq!(update.backoff.delay_for(None), Duration::from_secs(4));
    assert_eq!(update.backoff.notice_window, Duration::from_secs(1));
}

/// Test response classification and Retry-After parsing together
#[test]
fn test_rate_limit_classification() {
    assert!(ResponseClass::from_status_code(429).should_retry());
    assert!(!ResponseClass::from_status_code(500).should_retry());
    assert!(!ResponseClass::from_status_code(201).should_retry());

    let backoff = BackoffConfig::default();
    assert_eq!(backoff.wait_for(parse_retry_after(Some("5"))), Duration::from_secs(5));
    assert_eq!(backoff.wait_for(parse_retry_after(Some("-1"))), Duration::from_secs(1));
    assert_eq!(backoff.wait_for(parse_retry_after(None)), Duration::from_secs(1));
}

/// Test that the admission limiter caps concurrent holders across tasks
#[tokio::test(start_paused = true)]
async fn test_admission_limiter_under_load() {
    let limiter = AdmissionLimiter::new(2);
    let mut handles = Vec::new();

    for _ in 0..10 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            let _permit = limiter.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = limiter.stats();
    assert_eq!(stats.limit, 2);
    assert_eq!(stats.peak_in_flight, 2);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.permits_granted, 10);
    assert_eq!(limiter.available_permits(), 2);
}

/// Test that retry notices from many tasks are coalesced
#[tokio::test(start_paused = true)]
async fn test_retry_notices_are_coalesced() {
    let controller = RetryController::spawn(Duration::from_secs(1), "test");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let notifier = controller.notifier();
        handles.push(tokio::spawn(async move {
            notifier.notify(Duration::from_secs(2));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let summary = controller.finish().await;
    assert_eq!(summary.total_events, 8);
    // first event flushes immediately, the rest are flushed together at close
    assert!(summary.notices_emitted <= 2);
    assert!(summary.notices_emitted >= 1);
}
