//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{LinkRecord, LinkStatus, ProbeResult, RecordPage, RecordUpdate};
use crate::orchestrator::{RunEvent, RunReporter};
use crate::pacer::Pacer;
use crate::traits::{Probe, RecordSource};

// ---------------------------------------------------------------------------
// MockProbe
// ---------------------------------------------------------------------------

/// Mock probe that returns queued results, then a fallback.
///
/// With [`MockProbe::with_delay`] every call sleeps before answering, which
/// lets tests observe how many calls overlap.
#[derive(Clone)]
pub struct MockProbe {
    /// Each call pops the first element; when empty, `fallback` is returned.
    results: Arc<Mutex<Vec<ProbeResult>>>,
    fallback: ProbeResult,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    pub calls: Arc<Mutex<Vec<String>>>,
    /// `start <url>` and `end <url>` entries in the order they happened.
    pub timeline: Arc<Mutex<Vec<String>>>,
}

impl MockProbe {
    pub fn always(result: ProbeResult) -> Self {
        Self::with_results(Vec::new(), result)
    }

    pub fn with_results(results: Vec<ProbeResult>, fallback: ProbeResult) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            fallback,
            delay: Duration::ZERO,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
            timeline: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Position of `entry` in the timeline.
    pub fn timeline_position(&self, entry: &str) -> Option<usize> {
        self.timeline.lock().unwrap().iter().position(|e| e == entry)
    }
}

#[async_trait]
impl Probe for MockProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        self.calls.lock().unwrap().push(url.to_string());
        self.timeline.lock().unwrap().push(format!("start {url}"));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.timeline.lock().unwrap().push(format!("end {url}"));

        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            self.fallback.clone()
        } else {
            results.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Recorded write: (record id, update).
pub type UpdateRecord = (String, RecordUpdate);

/// In-memory record source backed by a Vec.
#[derive(Clone)]
pub struct MockSource {
    name: String,
    records: Arc<Mutex<Vec<LinkRecord>>>,
    read_error: Option<String>,
    /// Ids returned as rows but left out of pages, like rows a store cannot decode.
    undecodable: Vec<String>,
    update_error: Arc<Mutex<Option<AppError>>>,
    page_calls: Arc<Mutex<Vec<(u64, u64)>>>,
    pub updates: Arc<Mutex<Vec<UpdateRecord>>>,
}

impl MockSource {
    pub fn new(name: &str, records: Vec<LinkRecord>) -> Self {
        Self {
            name: name.to_string(),
            records: Arc::new(Mutex::new(records)),
            read_error: None,
            undecodable: Vec::new(),
            update_error: Arc::new(Mutex::new(None)),
            page_calls: Arc::new(Mutex::new(Vec::new())),
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Source whose count and page calls always fail.
    pub fn failing(name: &str, message: &str) -> Self {
        let mut source = Self::new(name, Vec::new());
        source.read_error = Some(message.to_string());
        source
    }

    /// Count these records as page rows but never return them.
    pub fn with_undecodable(mut self, ids: &[&str]) -> Self {
        self.undecodable = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// Source that fails the next update call.
    pub fn with_update_error(self, error: AppError) -> Self {
        *self.update_error.lock().unwrap() = Some(error);
        self
    }

    pub fn record(&self, id: &str) -> Option<LinkRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn page_calls(&self) -> Vec<(u64, u64)> {
        self.page_calls.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl RecordSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self) -> Result<u64, AppError> {
        if let Some(msg) = &self.read_error {
            return Err(AppError::DatabaseError(msg.clone()));
        }
        Ok(self.records.lock().unwrap().len() as u64)
    }

    async fn page(&self, offset: u64, limit: u64) -> Result<RecordPage, AppError> {
        self.page_calls.lock().unwrap().push((offset, limit));
        if let Some(msg) = &self.read_error {
            return Err(AppError::DatabaseError(msg.clone()));
        }
        let mut sorted = self.records.lock().unwrap().clone();
        sorted.sort_by(LinkRecord::staleness_cmp);
        let rows: Vec<LinkRecord> = sorted
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(RecordPage {
            rows: rows.len() as u64,
            records: rows
                .into_iter()
                .filter(|r| !self.undecodable.contains(&r.id))
                .collect(),
        })
    }

    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<(), AppError> {
        let mut err = self.update_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }

        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), update.clone()));

        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                if let Some(status) = update.status {
                    record.status = status;
                }
                record.last_checked = Some(update.last_checked);
                Ok(())
            }
            None => Err(AppError::DatabaseError(format!("No record with id {id}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockPacer
// ---------------------------------------------------------------------------

/// Pacer that records which waves it was asked to pause before.
#[derive(Clone, Default)]
pub struct MockPacer {
    pub pauses: Arc<Mutex<Vec<usize>>>,
}

impl MockPacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pacer for MockPacer {
    async fn pause(&self, next_wave: usize) {
        self.pauses.lock().unwrap().push(next_wave);
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock run reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }
}

impl RunReporter for MockReporter {
    fn report(&self, event: RunEvent<'_>) {
        let label = match &event {
            RunEvent::Started { .. } => "Started",
            RunEvent::QueueBuilt { .. } => "QueueBuilt",
            RunEvent::WaveStarted { .. } => "WaveStarted",
            RunEvent::RecordChecked { .. } => "RecordChecked",
            RunEvent::RecordSkipped { .. } => "RecordSkipped",
            RunEvent::ProviderTripped { .. } => "ProviderTripped",
            RunEvent::WaveFinished { .. } => "WaveFinished",
            RunEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a never-validated record with a Quark share URL.
pub fn make_record(id: &str, source: &str, last_checked: Option<DateTime<Utc>>) -> LinkRecord {
    LinkRecord {
        id: id.to_string(),
        url: format!("https://pan.quark.cn/s/{id}"),
        source: source.to_string(),
        status: LinkStatus::Unchecked,
        last_checked,
    }
}

/// Create a record with an explicit URL.
pub fn make_record_with_url(id: &str, source: &str, url: &str) -> LinkRecord {
    LinkRecord {
        url: url.to_string(),
        ..make_record(id, source, None)
    }
}
