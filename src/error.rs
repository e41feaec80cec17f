//! Error kinds surfaced by the bulk update engine

use thiserror::Error;

/// Errors produced while planning or dispatching a bulk update.
///
/// `Configuration` is the only kind returned as `Err` from
/// [`BulkUpdater::update`](crate::api::update::BulkUpdater::update); the
/// others are recorded per batch (concurrent mode) or on the run itself
/// (sequential mode) inside the [`UpdateReport`](crate::api::update::UpdateReport).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpdateError {
    /// Invalid input detected before any request was sent
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-success response (other than 429) or a failed send
    #[error("transport error (status {status:?}): {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The server kept answering 429 until the attempt budget ran out
    #[error("rate limit exceeded after {attempts} attempt(s)")]
    RateLimitExceeded { attempts: u32 },

    /// Sequential run halted mid-stream
    #[error("update halted after {updated} of {total} record(s): {cause}")]
    PartialFailure {
        updated: usize,
        total: usize,
        cause: Box<UpdateError>,
    },
}

impl UpdateError {
    pub fn configuration(message: impl Into<String>) -> Self {
        UpdateError::Configuration(message.into())
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        UpdateError::Transport {
            status,
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, UpdateError::Configuration(_))
    }
}
