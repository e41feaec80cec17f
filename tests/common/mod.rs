//! Shared fixtures for the bulk update tests
//!
//! - `FakeTransport`: scripted responses per batch, call log and an
//!   in-flight counter
//! - schema and change-set factories

#![allow(dead_code)]

use async_trait::async_trait;
use copper_cli::api::update::Batch;
use copper_cli::api::{
    BulkTransport, ChangeSet, CustomFieldDefinition, SchemaSnapshot, TransportResponse,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// One request seen by the fake
#[derive(Debug, Clone)]
pub struct Call {
    pub batch: usize,
    pub ids: Vec<i64>,
    /// Request body as it would go over the wire
    pub body: serde_json::Value,
    pub at: Instant,
}

/// Instrumented stand-in for the remote endpoint.
///
/// Each batch index can be given a queue of responses; once a queue runs dry
/// (or for unscripted batches) the fake answers 200.
pub struct FakeTransport {
    scripts: Mutex<HashMap<usize, VecDeque<TransportResponse>>>,
    always: Mutex<HashMap<usize, TransportResponse>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: Duration,
    started: Instant,
}

impl FakeTransport {
    pub fn new(latency: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            always: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            latency,
            started: Instant::now(),
        }
    }

    /// Answer the next requests for `batch` with `responses`, in order
    pub fn script(self, batch: usize, responses: Vec<TransportResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(batch, responses.into_iter().collect());
        self
    }

    /// Answer every request for `batch` with `response`
    pub fn always(self, batch: usize, response: TransportResponse) -> Self {
        self.always.lock().unwrap().insert(batch, response);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_order(&self) -> Vec<usize> {
        self.calls().iter().map(|c| c.batch).collect()
    }

    pub fn attempts_for(&self, batch: usize) -> usize {
        self.calls().iter().filter(|c| c.batch == batch).count()
    }

    /// Time from construction to each request for `batch`
    pub fn offsets_for(&self, batch: usize) -> Vec<Duration> {
        self.calls()
            .iter()
            .filter(|c| c.batch == batch)
            .map(|c| c.at.duration_since(self.started))
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkTransport for FakeTransport {
    async fn send_batch(&self, batch: &Batch) -> anyhow::Result<TransportResponse> {
        self.calls.lock().unwrap().push(Call {
            batch: batch.index,
            ids: batch.ids(),
            body: serde_json::to_value(batch.to_request()).unwrap(),
            at: Instant::now(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(response) = self.always.lock().unwrap().get(&batch.index) {
            return Ok(response.clone());
        }
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&batch.index)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(TransportResponse::ok))
    }
}

/// Transport whose requests never reach a server
pub struct UnreachableTransport;

#[async_trait]
impl BulkTransport for UnreachableTransport {
    async fn send_batch(&self, batch: &Batch) -> anyhow::Result<TransportResponse> {
        anyhow::bail!("connection refused for batch {}", batch.index)
    }
}

pub fn schema() -> Arc<SchemaSnapshot> {
    Arc::new(SchemaSnapshot::from_definitions(vec![
        CustomFieldDefinition::new(101, "Region"),
        CustomFieldDefinition::new(102, "Score"),
    ]))
}

/// `rows` companies with ids 1..=rows and values for Region and Score
pub fn change_set(rows: usize) -> ChangeSet {
    let columns = vec!["id".to_string(), "Region".to_string(), "Score".to_string()];
    let rows = (1..=rows as i64)
        .map(|id| vec![json!(id), json!(format!("region-{}", id % 3)), json!(id * 10)])
        .collect();
    ChangeSet::new(columns, rows).unwrap()
}

pub const FIELDS: &[&str] = &["Region", "Score"];
