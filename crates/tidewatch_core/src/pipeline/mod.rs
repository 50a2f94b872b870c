//! The staleness-gated collection pipeline.
//!
//! [`SourceProcessor`] handles one source end to end. [`SourceWorkerPool`]
//! fans a cycle's sources out to a fixed number of workers and collects one
//! [`CycleOutcome`] per source. [`CycleRunner`] wraps a pool cycle with
//! measurements, alerts and the telemetry flush.

mod outcome;
mod pool;
mod processor;
mod runner;

use async_trait::async_trait;

use crate::error::FetchError;

pub use outcome::{CycleOutcome, CycleSummary};
pub use pool::SourceWorkerPool;
pub use processor::SourceProcessor;
pub use runner::CycleRunner;

/// Retrieves a source payload.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, FetchError>;
}
