//! Concurrent dispatch: bounded fan-out with per-batch rate-limit retries

use super::planner::Batch;
use super::report::{BatchResult, BatchTracker, ConcurrentReport, ResultAggregator};
use super::transport::BulkTransport;
use crate::api::resilience::{
    AdmissionLimiter, BackoffConfig, PermitPolicy, ResponseClass, RetryController, RetryNotifier,
    UpdateConfig, parse_retry_after,
};
use crate::error::UpdateError;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info};
use std::sync::Arc;

/// Runs every batch as its own task, at most `concurrency_limit` in flight
pub struct ConcurrentDispatcher {
    transport: Arc<dyn BulkTransport>,
    config: UpdateConfig,
    label: String,
}

/// Everything a batch task needs besides the batch itself
#[derive(Clone)]
struct BatchContext {
    transport: Arc<dyn BulkTransport>,
    limiter: AdmissionLimiter,
    notifier: RetryNotifier,
    backoff: BackoffConfig,
    max_retries: u32,
    label: Arc<str>,
}

impl ConcurrentDispatcher {
    pub fn new(transport: Arc<dyn BulkTransport>, config: UpdateConfig, label: impl Into<String>) -> Self {
        Self {
            transport,
            config,
            label: label.into(),
        }
    }

    pub async fn dispatch(&self, batches: Vec<Batch>) -> ConcurrentReport {
        let limiter = AdmissionLimiter::new(self.config.concurrency_limit);
        let controller = RetryController::spawn(self.config.backoff.notice_window, self.label.clone());
        let context = BatchContext {
            transport: self.transport.clone(),
            limiter: limiter.clone(),
            notifier: controller.notifier(),
            backoff: self.config.backoff.clone(),
            max_retries: self.config.max_retries,
            label: Arc::from(self.label.as_str()),
        };

        debug!(
            "[{}] Dispatching {} batch(es), {} at a time",
            self.label,
            batches.len(),
            self.config.concurrency_limit
        );

        let mut aggregator = ResultAggregator::with_capacity(batches.len());
        let mut tasks = FuturesUnordered::new();
        for batch in batches {
            let index = batch.index;
            let ids = batch.ids();
            let handle = tokio::spawn(run_batch(context.clone(), batch));
            tasks.push(async move { (index, ids, handle.await) });
        }
        // the controller only stops once every notifier is gone
        drop(context);

        while let Some((index, ids, joined)) = tasks.next().await {
            match joined {
                Ok(result) => aggregator.record(result),
                Err(e) => {
                    error!("[{}] Batch {} task ended abnormally: {}", self.label, index, e);
                    aggregator.record(BatchResult::aborted(index, ids, e.to_string()));
                }
            }
        }

        let retries = controller.finish().await;
        let report = aggregator.finish(retries.total_events, limiter.stats().peak_in_flight);
        info!(
            "[{}] {}/{} batches updated successfully",
            self.label, report.batches_succeeded, report.batches_attempted
        );
        report
    }
}

async fn run_batch(context: BatchContext, batch: Batch) -> BatchResult {
    let mut tracker = BatchTracker::new(&batch);

    for attempt in 1..=context.max_retries {
        let mut permit = match context.limiter.acquire().await {
            Ok(permit) => Some(permit),
            Err(e) => return tracker.fail(UpdateError::transport(None, e.to_string())),
        };

        tracker.sending();
        let response = match context.transport.send_batch(&batch).await {
            Ok(response) => response,
            Err(e) => {
                error!("[{}] Batch {} could not be sent: {:#}", context.label, batch.index, e);
                return tracker.fail(UpdateError::transport(None, format!("{:#}", e)));
            }
        };

        match ResponseClass::from_status_code(response.status) {
            ResponseClass::Success => {
                if attempt > 1 {
                    info!(
                        "[{}] Batch {} succeeded after {} retries",
                        context.label,
                        batch.index,
                        attempt - 1
                    );
                }
                return tracker.succeed();
            }
            ResponseClass::RateLimited => {
                let retry_after = parse_retry_after(response.retry_after.as_deref());
                let wait = context.backoff.wait_for(retry_after);
                tracker.rate_limited(wait);
                context.notifier.notify(wait);

                if attempt == context.max_retries {
                    break;
                }
                if context.backoff.permit_policy == PermitPolicy::ReleaseDuringBackoff {
                    permit.take();
                }
                tokio::time::sleep(context.backoff.delay_for(retry_after)).await;
                drop(permit);
            }
            ResponseClass::Failed(status) => {
                error!(
                    "[{}] Batch {} failed with status {}: {}",
                    context.label, batch.index, status, response.body
                );
                return tracker.fail(UpdateError::transport(Some(status), response.body));
            }
        }
    }

    error!(
        "[{}] Batch {} failed after {} attempt(s)",
        context.label,
        batch.index,
        tracker.attempts()
    );
    let attempts = tracker.attempts();
    tracker.fail(UpdateError::RateLimitExceeded { attempts })
}
