//! Sequential dispatch: one request at a time, stop at the first failure

use super::planner::Batch;
use super::report::SequentialReport;
use super::transport::BulkTransport;
use crate::api::resilience::ResponseClass;
use crate::error::UpdateError;
use log::{debug, error, info};
use std::sync::Arc;

/// Sends batches strictly in order and never retries
pub struct SequentialDispatcher {
    transport: Arc<dyn BulkTransport>,
    label: String,
}

impl SequentialDispatcher {
    pub fn new(transport: Arc<dyn BulkTransport>, label: impl Into<String>) -> Self {
        Self {
            transport,
            label: label.into(),
        }
    }

    pub async fn dispatch(&self, batches: &[Batch]) -> SequentialReport {
        let total: usize = batches.iter().map(Batch::len).sum();
        let mut records_updated = 0;

        for (position, batch) in batches.iter().enumerate() {
            debug!(
                "[{}] Sending batch {}/{} ({} record(s))",
                self.label,
                position + 1,
                batches.len(),
                batch.len()
            );

            if let Err(cause) = self.send(batch).await {
                error!("[{}] Batch {} failed, stopping: {}", self.label, batch.index, cause);
                return SequentialReport {
                    records_updated,
                    batches_completed: position,
                    batches_total: batches.len(),
                    error: Some(UpdateError::PartialFailure {
                        updated: records_updated,
                        total,
                        cause: Box::new(cause),
                    }),
                    pending_ids: batches[position..].iter().flat_map(Batch::ids).collect(),
                };
            }

            records_updated += batch.len();
            debug!("[{}] {}/{} record(s) updated", self.label, records_updated, total);
        }

        info!("[{}] All {} record(s) updated", self.label, records_updated);
        SequentialReport {
            records_updated,
            batches_completed: batches.len(),
            batches_total: batches.len(),
            error: None,
            pending_ids: Vec::new(),
        }
    }

    async fn send(&self, batch: &Batch) -> Result<(), UpdateError> {
        let response = self
            .transport
            .send_batch(batch)
            .await
            .map_err(|e| UpdateError::transport(None, format!("{:#}", e)))?;

        match ResponseClass::from_status_code(response.status) {
            ResponseClass::Success => Ok(()),
            ResponseClass::RateLimited => Err(UpdateError::RateLimitExceeded { attempts: 1 }),
            ResponseClass::Failed(status) => Err(UpdateError::transport(Some(status), response.body)),
        }
    }
}
