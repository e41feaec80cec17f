//! Transport seam between the dispatchers and the remote endpoint

use super::planner::Batch;
use async_trait::async_trait;

/// The parts of an HTTP response the dispatchers look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Raw `Retry-After` header value, if any
    pub retry_after: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn rate_limited(retry_after: Option<&str>) -> Self {
        Self {
            status: 429,
            retry_after: retry_after.map(str::to_string),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Sends one batch as one bulk update request.
///
/// `Err` means the request never produced a response (connection, TLS,
/// timeout); the dispatchers treat it as a hard failure for that batch.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn send_batch(&self, batch: &Batch) -> anyhow::Result<TransportResponse>;
}
