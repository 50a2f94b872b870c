//! Fakes for the pipeline seams: probe, fetcher, telemetry sink, alert channel.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use tidewatch_core::alerts::{AlertChannel, AlertDispatcher, AlertEvent};
use tidewatch_core::error::{ChannelError, FetchError, ProbeError, SubmissionError};
use tidewatch_core::freshness::FreshnessProbe;
use tidewatch_core::pipeline::{CycleRunner, PayloadFetcher, SourceProcessor, SourceWorkerPool};
use tidewatch_core::telemetry::{Measurement, PendingRecord, TelemetryBatcher, TelemetrySink};

// ==================== Probe ====================

#[derive(Default)]
pub struct FakeProbe {
    times: Mutex<HashMap<String, Result<DateTime<Utc>, ProbeError>>>,
    pub calls: AtomicUsize,
}

impl FakeProbe {
    pub fn modified(self, target: &str, at: DateTime<Utc>) -> Self {
        self.times.lock().insert(target.to_string(), Ok(at));
        self
    }

    pub fn failing(self, target: &str, error: ProbeError) -> Self {
        self.times.lock().insert(target.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl FreshnessProbe for FakeProbe {
    async fn probe(&self, target: &str) -> Result<DateTime<Utc>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.times
            .lock()
            .get(target)
            .cloned()
            .unwrap_or_else(|| Ok(Utc::now()))
    }
}

// ==================== Fetcher ====================

#[derive(Default)]
pub struct FakeFetcher {
    payloads: Mutex<HashMap<String, Result<Vec<u8>, FetchError>>>,
    panics: Mutex<Vec<String>>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn serving(self, target: &str, body: &str) -> Self {
        self.payloads
            .lock()
            .insert(target.to_string(), Ok(body.as_bytes().to_vec()));
        self
    }

    pub fn failing(self, target: &str, status: u16) -> Self {
        self.payloads.lock().insert(
            target.to_string(),
            Err(FetchError::Status {
                target: target.to_string(),
                status,
            }),
        );
        self
    }

    pub fn panicking(self, target: &str) -> Self {
        self.panics.lock().push(target.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PayloadFetcher for FakeFetcher {
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().push(target.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics.lock().iter().any(|t| t == target) {
            panic!("fetcher exploded on {target}");
        }

        self.payloads
            .lock()
            .get(target)
            .cloned()
            .unwrap_or_else(|| Ok(b"[]".to_vec()))
    }
}

// ==================== Telemetry ====================

#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<PendingRecord>>,
    pub measurements: Mutex<Vec<Measurement>>,
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn submit_records(&self, records: &[PendingRecord]) -> Result<(), SubmissionError> {
        self.records.lock().extend_from_slice(records);
        Ok(())
    }

    async fn submit_measurements(&self, measurements: &[Measurement]) -> Result<(), SubmissionError> {
        self.measurements.lock().extend_from_slice(measurements);
        Ok(())
    }
}

// ==================== Alerts ====================

pub struct RecordingChannel {
    name: String,
    pub alerts: Mutex<Vec<AlertEvent>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            alerts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}

// ==================== Wiring ====================

pub struct Harness {
    pub probe: Arc<FakeProbe>,
    pub fetcher: Arc<FakeFetcher>,
    pub sink: Arc<RecordingSink>,
    pub channel: Arc<RecordingChannel>,
    pub runner: CycleRunner,
}

pub fn harness(probe: FakeProbe, fetcher: FakeFetcher, concurrency: usize) -> Harness {
    let probe = Arc::new(probe);
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(RecordingSink::default());
    let channel = RecordingChannel::new("recorder");

    let batcher = Arc::new(TelemetryBatcher::new(sink.clone()));
    let processor = Arc::new(SourceProcessor::new(
        probe.clone(),
        fetcher.clone(),
        batcher.clone(),
    ));
    let pool = SourceWorkerPool::new(processor, concurrency);
    let alerts = Arc::new(AlertDispatcher::new().with_channel(channel.clone(), true));
    let runner = CycleRunner::new(pool, batcher, alerts);

    Harness {
        probe,
        fetcher,
        sink,
        channel,
        runner,
    }
}
