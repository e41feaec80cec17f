//! Admission limiter for concurrent batch requests
//!
//! Hands out at most `limit` interchangeable permits. A permit is held for
//! as long as a batch task is talking to the server (and, depending on the
//! permit policy, while it backs off after a 429).

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Shared admission limiter; cloning shares the same permits
#[derive(Debug, Clone)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    counters: Arc<AdmissionCounters>,
    limit: usize,
}

#[derive(Debug, Default)]
struct AdmissionCounters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    permits_granted: AtomicU64,
}

/// Permit returned by [`AdmissionLimiter::acquire`]; released on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<AdmissionCounters>,
}

impl AdmissionLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            counters: Arc::new(AdmissionCounters::default()),
            limit,
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> anyhow::Result<AdmissionPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("admission limiter closed"))?;

        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.counters.permits_granted.fetch_add(1, Ordering::Relaxed);
        debug!("Admission: slot granted, {}/{} in flight", in_flight, self.limit);

        Ok(AdmissionPermit {
            _permit: permit,
            counters: self.counters.clone(),
        })
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            limit: self.limit,
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::SeqCst),
            permits_granted: self.counters.permits_granted.load(Ordering::Relaxed),
        }
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Admission limiter statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionStats {
    pub limit: usize,
    /// Permits currently held
    pub in_flight: usize,
    /// Highest number of permits held at once
    pub peak_in_flight: usize,
    /// Total permits handed out, re-acquisitions included
    pub permits_granted: u64,
}
