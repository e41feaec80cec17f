//! Bulk company updates
//!
//! Turns a [`ChangeSet`] into batches of at most `batch_size` records and
//! pushes them to the bulk update endpoint, either one at a time
//! ([`UpdateMode::Sequential`], stop at the first failure) or as parallel
//! tasks behind an admission limiter ([`UpdateMode::Concurrent`], per-batch
//! retries on 429).

pub mod changeset;
pub mod concurrent;
pub mod planner;
pub mod report;
pub mod sequential;
pub mod transport;

pub use changeset::{ChangeSet, ID_COLUMN};
pub use concurrent::ConcurrentDispatcher;
pub use planner::{Batch, BatchPlan, BatchPlanner, BulkUpdateRequest, ResolvedField, UpdateRecord};
pub use report::{
    BatchResult, BatchState, BatchTracker, ConcurrentReport, DispatchOutcome, ResultAggregator,
    SequentialReport, UpdateReport,
};
pub use sequential::SequentialDispatcher;
pub use transport::{BulkTransport, TransportResponse};

use crate::api::resilience::UpdateConfig;
use crate::api::schema::SchemaSnapshot;
use crate::error::UpdateError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// How batches are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// One request at a time, abort on the first failure
    #[default]
    Sequential,
    /// Parallel requests with rate-limit retries
    Concurrent,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMode::Sequential => write!(f, "sequential"),
            UpdateMode::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Entry point tying planner and dispatchers together
pub struct BulkUpdater {
    transport: Arc<dyn BulkTransport>,
    schema: Arc<SchemaSnapshot>,
    config: UpdateConfig,
}

impl BulkUpdater {
    pub fn new(transport: Arc<dyn BulkTransport>, schema: Arc<SchemaSnapshot>) -> Self {
        Self {
            transport,
            schema,
            config: UpdateConfig::default(),
        }
    }

    pub fn with_config(mut self, config: UpdateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Update every row of `change_set` for the given target fields.
    ///
    /// Configuration problems are returned as `Err` before any request is
    /// sent. Transport and rate-limit failures end up in the report, which
    /// accounts for every row as updated or not.
    pub async fn update<S: AsRef<str>>(
        &self,
        change_set: &ChangeSet,
        target_fields: &[S],
        mode: UpdateMode,
    ) -> Result<UpdateReport, UpdateError> {
        self.config.validate()?;

        let plan = BatchPlanner::new(self.schema.clone(), self.config.batch_size)
            .plan(change_set, target_fields)?;
        let run_id = Uuid::new_v4();
        let label = run_id.simple().to_string()[..8].to_string();
        let total_records = plan.total_records();

        info!(
            "[{}] Updating {} record(s) in {} batch(es), mode {}",
            label,
            total_records,
            plan.batches.len(),
            mode
        );

        let outcome = match mode {
            UpdateMode::Sequential => DispatchOutcome::Sequential(
                SequentialDispatcher::new(self.transport.clone(), label.clone())
                    .dispatch(&plan.batches)
                    .await,
            ),
            UpdateMode::Concurrent => DispatchOutcome::Concurrent(
                ConcurrentDispatcher::new(self.transport.clone(), self.config.clone(), label.clone())
                    .dispatch(plan.batches)
                    .await,
            ),
        };

        let report = UpdateReport {
            run_id,
            total_records,
            skipped_fields: plan.skipped_fields,
            missing_columns: plan.missing_columns,
            outcome,
        };

        if report.is_complete() {
            info!("[{}] {} record(s) updated", label, report.records_updated());
        } else {
            warn!(
                "[{}] {} of {} record(s) were not updated",
                label,
                report.records_failed(),
                total_records
            );
        }

        Ok(report)
    }
}
