use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error};

use super::{Measurement, PendingRecord, TelemetrySink};
use crate::error::{FlushError, SubmissionError};
use crate::transform::Record;

#[derive(Debug, Default)]
struct PendingBatch {
    records: Vec<PendingRecord>,
    measurements: Vec<Measurement>,
}

/// Running submission statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryStats {
    pub records_sent: u64,
    pub measurements_sent: u64,
    pub record_errors: u64,
    pub measurement_errors: u64,
    pub last_record_success: Option<DateTime<Utc>>,
    pub last_measurement_success: Option<DateTime<Utc>>,
}

/// What one successful flush submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub records_sent: usize,
    pub measurements_sent: usize,
}

/// Accumulates records and measurements between flushes.
///
/// Adds take the lock briefly. A flush swaps both collections out under the
/// lock and submits them after releasing it, so adds racing a flush land in
/// the next batch. Failed batches are dropped.
pub struct TelemetryBatcher {
    sink: Arc<dyn TelemetrySink>,
    pending: Mutex<PendingBatch>,
    stats: Mutex<TelemetryStats>,
}

impl TelemetryBatcher {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink,
            pending: Mutex::new(PendingBatch::default()),
            stats: Mutex::new(TelemetryStats::default()),
        }
    }

    pub fn add_record(&self, category: impl Into<String>, record: Record) {
        let pending = PendingRecord {
            category: category.into(),
            timestamp: Utc::now(),
            record,
        };
        self.pending.lock().records.push(pending);
    }

    pub fn add_records(&self, category: &str, records: Vec<Record>) {
        let timestamp = Utc::now();
        let mut pending = self.pending.lock();
        pending
            .records
            .extend(records.into_iter().map(|record| PendingRecord {
                category: category.to_string(),
                timestamp,
                record,
            }));
    }

    pub fn add_measurement(&self, measurement: Measurement) {
        self.pending.lock().measurements.push(measurement);
    }

    pub fn add_measurements(&self, measurements: impl IntoIterator<Item = Measurement>) {
        self.pending.lock().measurements.extend(measurements);
    }

    /// `(records, measurements)` currently waiting.
    pub fn pending_counts(&self) -> (usize, usize) {
        let pending = self.pending.lock();
        (pending.records.len(), pending.measurements.len())
    }

    pub fn stats(&self) -> TelemetryStats {
        self.stats.lock().clone()
    }

    /// Submit everything pending.
    ///
    /// Records and measurements are submitted independently; both are always
    /// attempted and every failure is reported.
    pub async fn flush(&self) -> Result<FlushReport, FlushError> {
        let batch = std::mem::take(&mut *self.pending.lock());

        if batch.records.is_empty() && batch.measurements.is_empty() {
            return Ok(FlushReport::default());
        }

        let records = async {
            if batch.records.is_empty() {
                return Ok(0);
            }
            self.sink
                .submit_records(&batch.records)
                .await
                .map(|_| batch.records.len())
        };
        let measurements = async {
            if batch.measurements.is_empty() {
                return Ok(0);
            }
            self.sink
                .submit_measurements(&batch.measurements)
                .await
                .map(|_| batch.measurements.len())
        };
        let (records, measurements): (
            Result<usize, SubmissionError>,
            Result<usize, SubmissionError>,
        ) = futures::join!(records, measurements);

        let now = Utc::now();
        let mut report = FlushReport::default();
        let mut failures = Vec::new();
        {
            let mut stats = self.stats.lock();
            match records {
                Ok(0) => {}
                Ok(sent) => {
                    stats.records_sent += sent as u64;
                    stats.last_record_success = Some(now);
                    report.records_sent = sent;
                }
                Err(e) => {
                    stats.record_errors += 1;
                    failures.push(e);
                }
            }
            match measurements {
                Ok(0) => {}
                Ok(sent) => {
                    stats.measurements_sent += sent as u64;
                    stats.last_measurement_success = Some(now);
                    report.measurements_sent = sent;
                }
                Err(e) => {
                    stats.measurement_errors += 1;
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            debug!(
                records = report.records_sent,
                measurements = report.measurements_sent,
                "telemetry batch flushed"
            );
            Ok(report)
        } else {
            let error = FlushError { failures };
            error!(error = %error, "telemetry flush failed, dropping batch");
            Err(error)
        }
    }
}
