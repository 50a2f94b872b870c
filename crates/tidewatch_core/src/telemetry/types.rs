use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transform::{AttributeValue, Record};

/// Metric names emitted by the pipeline.
pub mod names {
    pub const PROCESSING_DURATION: &str = "tidewatch.processing.duration";
    pub const PROCESSING_RECORDS: &str = "tidewatch.processing.records";
    pub const PROCESSING_STATUS: &str = "tidewatch.processing.status";

    pub const STALENESS_AGE: &str = "tidewatch.staleness.age";
    pub const STALENESS_THRESHOLD: &str = "tidewatch.staleness.threshold";
    pub const STALENESS_RATIO: &str = "tidewatch.staleness.ratio";

    pub const CYCLE_DURATION: &str = "tidewatch.cycle.duration";
    pub const CYCLE_RECORDS: &str = "tidewatch.cycle.records";
    pub const CYCLE_ERRORS: &str = "tidewatch.cycle.errors";
    pub const CYCLE_STALE_SOURCES: &str = "tidewatch.cycle.stale_sources";

    pub const HEALTH_CHECK: &str = "tidewatch.health.check";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementKind {
    #[serde(rename = "count")]
    Counter,
    #[serde(rename = "gauge")]
    Gauge,
}

/// A named numeric observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MeasurementKind,
    pub value: f64,
    /// Unix time in milliseconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, kind: MeasurementKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            timestamp: Utc::now().timestamp_millis(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MeasurementKind::Counter, value)
    }

    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MeasurementKind::Gauge, value)
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.timestamp_millis();
        self
    }
}

/// A record waiting to be submitted, tagged with its category.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub record: Record,
}
