//! Telemetry batching and submission.
//!
//! Workers append records and measurements to a shared [`TelemetryBatcher`];
//! the cycle runner flushes it through a [`TelemetrySink`] once per cycle.

mod batcher;
mod http_sink;
mod types;

use async_trait::async_trait;

use crate::error::SubmissionError;

pub use batcher::{FlushReport, TelemetryBatcher, TelemetryStats};
pub use http_sink::HttpTelemetrySink;
pub use types::{names, Measurement, MeasurementKind, PendingRecord};

/// Destination for flushed batches.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn submit_records(&self, records: &[PendingRecord]) -> Result<(), SubmissionError>;

    async fn submit_measurements(&self, measurements: &[Measurement]) -> Result<(), SubmissionError>;
}
