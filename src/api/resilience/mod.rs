//! Rate-limit resilience for bulk updates
//!
//! Provides update configuration, response classification, the admission
//! limiter and coalesced retry notices.

pub mod admission;
pub mod config;
pub mod retry;
pub mod retry_logger;

pub use admission::{AdmissionLimiter, AdmissionPermit, AdmissionStats};
pub use config::{BackoffConfig, PermitPolicy, UpdateConfig, UpdateConfigBuilder};
pub use retry::{ResponseClass, parse_retry_after};
pub use retry_logger::{RetryController, RetryEvent, RetryNotifier, RetryState, RetrySummary};
