//! Tidewatch core
//!
//! Periodically collects data from HTTP sources, gates each source on how
//! fresh its data is, converts payloads into flat records, and forwards
//! records and measurements to a telemetry backend. Stale or failing sources
//! raise alerts through independently configured channels.
//!
//! The pieces, leaves first:
//!
//! - [`freshness`]: modification-time probes and the staleness decision
//! - [`transform`]: JSON/CSV payloads to [`transform::Record`]s
//! - [`telemetry`]: the shared batcher and its HTTP sink
//! - [`alerts`]: alert events and channel fan-out
//! - [`pipeline`]: the bounded worker pool and per-cycle runner
//! - [`scheduler`]: interval ticking and graceful shutdown

pub mod alerts;
pub mod config;
pub mod error;
pub mod freshness;
pub mod http;
pub mod pipeline;
pub mod scheduler;
pub mod telemetry;
pub mod transform;
pub mod utils;

pub use config::{load_config, SourceSpec, TidewatchConfig};
pub use error::{CoreError, Result};
pub use http::{tidewatch_http_client, HttpSourceClient};
pub use pipeline::{CycleOutcome, CycleRunner, CycleSummary, SourceProcessor, SourceWorkerPool};
pub use scheduler::CycleScheduler;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::alerts::{AlertChannel, AlertDispatcher, AlertEvent, AlertSeverity};
    pub use crate::config::{SourceSpec, TidewatchConfig};
    pub use crate::error::{CoreError, Result, SourceError};
    pub use crate::freshness::{FreshnessProbe, StalenessBehavior, StalenessPolicy};
    pub use crate::pipeline::{CycleOutcome, CycleRunner, PayloadFetcher, SourceWorkerPool};
    pub use crate::telemetry::{Measurement, TelemetryBatcher, TelemetrySink};
    pub use crate::transform::{AttributeValue, FilterExpr, PayloadFormat, Record};
}
