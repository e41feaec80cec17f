//! Batch outcomes and the final update report

use super::planner::Batch;
use crate::error::UpdateError;
use log::error;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of one batch in concurrent mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Sending,
    RateLimited,
    Succeeded,
    FailedPermanently,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Succeeded | BatchState::FailedPermanently)
    }

    pub fn can_transition_to(&self, next: BatchState) -> bool {
        use BatchState::*;
        matches!(
            (*self, next),
            (Pending, Sending)
                | (Pending, FailedPermanently)
                | (Sending, RateLimited)
                | (Sending, Succeeded)
                | (Sending, FailedPermanently)
                | (RateLimited, Sending)
                | (RateLimited, FailedPermanently)
        )
    }
}

/// Outcome of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub index: usize,
    pub ids: Vec<i64>,
    /// Requests actually sent for this batch
    pub attempts: u32,
    /// Every state the batch passed through, starting at `Pending`
    pub states: Vec<BatchState>,
    /// Server-suggested waits (or the default) seen on each 429
    pub rate_limit_waits: Vec<Duration>,
    pub error: Option<UpdateError>,
}

impl BatchResult {
    pub fn state(&self) -> BatchState {
        self.states.last().copied().unwrap_or(BatchState::Pending)
    }

    pub fn succeeded(&self) -> bool {
        self.state() == BatchState::Succeeded
    }

    /// Result for a task that died before reporting back
    pub fn aborted(index: usize, ids: Vec<i64>, message: impl Into<String>) -> Self {
        Self {
            index,
            ids,
            attempts: 0,
            states: vec![BatchState::Pending, BatchState::FailedPermanently],
            rate_limit_waits: Vec::new(),
            error: Some(UpdateError::transport(None, message)),
        }
    }
}

/// Records state transitions for one batch task and produces its result
#[derive(Debug)]
pub struct BatchTracker {
    result: BatchResult,
}

impl BatchTracker {
    pub fn new(batch: &Batch) -> Self {
        Self {
            result: BatchResult {
                index: batch.index,
                ids: batch.ids(),
                attempts: 0,
                states: vec![BatchState::Pending],
                rate_limit_waits: Vec::new(),
                error: None,
            },
        }
    }

    pub fn state(&self) -> BatchState {
        self.result.state()
    }

    pub fn attempts(&self) -> u32 {
        self.result.attempts
    }

    fn transition(&mut self, next: BatchState) {
        let current = self.state();
        if current.can_transition_to(next) {
            self.result.states.push(next);
        } else {
            error!(
                "Batch {}: ignoring invalid transition {:?} -> {:?}",
                self.result.index, current, next
            );
        }
    }

    pub fn sending(&mut self) {
        self.result.attempts += 1;
        self.transition(BatchState::Sending);
    }

    pub fn rate_limited(&mut self, wait: Duration) {
        self.result.rate_limit_waits.push(wait);
        self.transition(BatchState::RateLimited);
    }

    pub fn succeed(mut self) -> BatchResult {
        self.transition(BatchState::Succeeded);
        self.result
    }

    pub fn fail(mut self, error: UpdateError) -> BatchResult {
        self.transition(BatchState::FailedPermanently);
        self.result.error = Some(error);
        self.result
    }
}

/// Concurrent-mode tally
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrentReport {
    /// One result per batch, ordered by batch index
    pub results: Vec<BatchResult>,
    pub batches_attempted: usize,
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    pub retry_events: usize,
    pub peak_in_flight: usize,
}

impl ConcurrentReport {
    pub fn records_updated(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).map(|r| r.ids.len()).sum()
    }

    pub fn failed_ids(&self) -> Vec<i64> {
        self.results
            .iter()
            .filter(|r| !r.succeeded())
            .flat_map(|r| r.ids.iter().copied())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }
}

/// Sequential-mode outcome
#[derive(Debug, Clone, PartialEq)]
pub struct SequentialReport {
    pub records_updated: usize,
    pub batches_completed: usize,
    pub batches_total: usize,
    /// `PartialFailure` when the run halted early
    pub error: Option<UpdateError>,
    /// Ids in the failing batch and every batch after it
    pub pending_ids: Vec<i64>,
}

/// Collects per-batch results in completion order
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<BatchResult>,
}

impl ResultAggregator {
    pub fn with_capacity(batches: usize) -> Self {
        Self {
            results: Vec::with_capacity(batches),
        }
    }

    pub fn record(&mut self, result: BatchResult) {
        self.results.push(result);
    }

    pub fn finish(mut self, retry_events: usize, peak_in_flight: usize) -> ConcurrentReport {
        self.results.sort_by_key(|r| r.index);
        let batches_succeeded = self.results.iter().filter(|r| r.succeeded()).count();

        ConcurrentReport {
            batches_attempted: self.results.len(),
            batches_failed: self.results.len() - batches_succeeded,
            batches_succeeded,
            results: self.results,
            retry_events,
            peak_in_flight,
        }
    }
}

/// Mode-specific part of an [`UpdateReport`]
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sequential(SequentialReport),
    Concurrent(ConcurrentReport),
}

/// Result of one `update` call
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    pub run_id: Uuid,
    pub total_records: usize,
    /// Target fields with no matching field id
    pub skipped_fields: Vec<String>,
    /// Target fields whose source column is not in the change-set
    pub missing_columns: Vec<String>,
    pub outcome: DispatchOutcome,
}

impl UpdateReport {
    pub fn records_updated(&self) -> usize {
        match &self.outcome {
            DispatchOutcome::Sequential(report) => report.records_updated,
            DispatchOutcome::Concurrent(report) => report.records_updated(),
        }
    }

    pub fn records_failed(&self) -> usize {
        self.total_records - self.records_updated()
    }

    /// Ids that were not confirmed as updated
    pub fn failed_ids(&self) -> Vec<i64> {
        match &self.outcome {
            DispatchOutcome::Sequential(report) => report.pending_ids.clone(),
            DispatchOutcome::Concurrent(report) => report.failed_ids(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.records_failed() == 0
    }
}
