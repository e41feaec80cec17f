//! Coalesced rate-limit notices
//!
//! When many batches hit 429 at once, logging one line per retry is noisy.
//! Batch tasks send a [`RetryEvent`] down a channel instead; a single
//! consumer task owns the counters and emits one `warn!` per distinct wait
//! duration at most once per notice window. Retry timing is unaffected.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One batch being rate limited and about to wait `wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryEvent {
    pub wait: Duration,
}

/// Buckets of pending retry events keyed by wait duration
#[derive(Debug)]
pub struct RetryState {
    buckets: BTreeMap<Duration, usize>,
    last_flush: Option<Instant>,
    window: Duration,
}

impl RetryState {
    pub fn new(window: Duration) -> Self {
        Self {
            buckets: BTreeMap::new(),
            last_flush: None,
            window,
        }
    }

    pub fn record(&mut self, wait: Duration) {
        *self.buckets.entry(wait).or_insert(0) += 1;
    }

    /// True when nothing has been flushed yet or the window has elapsed
    pub fn flush_due(&self, now: Instant) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => now.duration_since(last) > self.window,
        }
    }

    /// Take all pending counts and restart the window at `now`
    pub fn flush(&mut self, now: Instant) -> Vec<(Duration, usize)> {
        self.last_flush = Some(now);
        std::mem::take(&mut self.buckets).into_iter().collect()
    }

    pub fn pending(&self) -> usize {
        self.buckets.values().sum()
    }
}

/// Totals reported once the controller shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub total_events: usize,
    pub notices_emitted: usize,
}

/// Cheap handle used by batch tasks to report retries
#[derive(Debug, Clone)]
pub struct RetryNotifier {
    sender: mpsc::UnboundedSender<RetryEvent>,
}

impl RetryNotifier {
    pub fn notify(&self, wait: Duration) {
        if self.sender.send(RetryEvent { wait }).is_err() {
            debug!("Retry controller already stopped, dropping notice for {:?}", wait);
        }
    }
}

/// Owner of the notice task for one concurrent dispatch
#[derive(Debug)]
pub struct RetryController {
    sender: mpsc::UnboundedSender<RetryEvent>,
    handle: JoinHandle<RetrySummary>,
}

impl RetryController {
    /// Spawn the consumer task; `label` prefixes every notice
    pub fn spawn(window: Duration, label: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(consume(receiver, RetryState::new(window), label.into()));
        Self { sender, handle }
    }

    pub fn notifier(&self) -> RetryNotifier {
        RetryNotifier {
            sender: self.sender.clone(),
        }
    }

    /// Close the channel, flush anything left and return the totals.
    ///
    /// Every notifier handed out must be dropped first or this waits forever.
    pub async fn finish(self) -> RetrySummary {
        drop(self.sender);
        match self.handle.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Retry notice task ended abnormally: {}", e);
                RetrySummary::default()
            }
        }
    }
}

async fn consume(
    mut receiver: mpsc::UnboundedReceiver<RetryEvent>,
    mut state: RetryState,
    label: String,
) -> RetrySummary {
    let mut summary = RetrySummary::default();

    while let Some(event) = receiver.recv().await {
        state.record(event.wait);
        summary.total_events += 1;

        let now = Instant::now();
        if state.flush_due(now) {
            summary.notices_emitted += emit(&label, state.flush(now));
        }
    }

    if state.pending() > 0 {
        summary.notices_emitted += emit(&label, state.flush(Instant::now()));
    }

    summary
}

fn emit(label: &str, counts: Vec<(Duration, usize)>) -> usize {
    let lines = counts.len();
    for (wait, count) in counts {
        warn!(
            "[{}] {} batch(es) rate limited, retrying in {}s",
            label,
            count,
            wait.as_secs_f64()
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_event_flushes_immediately() {
        let mut state = RetryState::new(Duration::from_secs(1));
        let now = Instant::now();

        state.record(Duration::from_secs(2));
        assert!(state.flush_due(now));
        assert_eq!(state.flush(now), vec![(Duration::from_secs(2), 1)]);
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_events_within_window_are_coalesced() {
        let mut state = RetryState::new(Duration::from_secs(1));
        let start = Instant::now();
        state.flush(start);

        state.record(Duration::from_secs(1));
        state.record(Duration::from_secs(1));
        state.record(Duration::from_secs(3));
        assert!(!state.flush_due(start + Duration::from_millis(500)));
        assert!(state.flush_due(start + Duration::from_millis(1001)));

        let flushed = state.flush(start + Duration::from_millis(1001));
        assert_eq!(
            flushed,
            vec![(Duration::from_secs(1), 2), (Duration::from_secs(3), 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_controller_counts_and_flushes_leftovers() {
        let controller = RetryController::spawn(Duration::from_secs(1), "test");
        let notifier = controller.notifier();

        // first notice goes out at once, the other two are held in the window
        notifier.notify(Duration::from_secs(1));
        tokio::task::yield_now().await;
        notifier.notify(Duration::from_secs(1));
        notifier.notify(Duration::from_secs(2));
        drop(notifier);

        let summary = controller.finish().await;
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.notices_emitted, 3);
    }
}
