use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::SourceError;
use crate::freshness::FreshnessResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Staleness,
    Error,
    HealthCheck,
    Test,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::Staleness => write!(f, "staleness"),
            AlertCategory::Error => write!(f, "error"),
            AlertCategory::HealthCheck => write!(f, "health_check"),
            AlertCategory::Test => write!(f, "test"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Error => write!(f, "error"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A notification fanned out to every enabled channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
}

impl AlertEvent {
    pub fn new(
        category: AlertCategory,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            title: title.into(),
            message: message.into(),
            source: source.into(),
            timestamp: Utc::now(),
            metadata: Map::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// A source's data is older than its threshold.
    pub fn staleness(source_name: &str, target: &str, result: &FreshnessResult) -> Self {
        let age = humantime::format_duration(std::time::Duration::from_secs(result.age.as_secs()));
        let threshold = humantime::format_duration(result.threshold);
        Self::new(
            AlertCategory::Staleness,
            AlertSeverity::Warning,
            format!("Stale data detected: {}", source_name),
            format!(
                "Data at {} is stale. Age: {}, threshold: {}",
                target, age, threshold
            ),
            source_name,
        )
        .with_metadata("url", target)
        .with_metadata("age_seconds", result.age.as_secs_f64())
        .with_metadata("threshold_seconds", result.threshold.as_secs_f64())
        .with_metadata(
            "modified_at",
            result.modified_at.map(|m| m.to_rfc3339()).unwrap_or_default(),
        )
        .with_metadata("source_name", source_name)
        .with_tag("staleness")
        .with_tag(source_name)
    }

    /// Processing a source failed.
    pub fn source_error(source_name: &str, error: &SourceError) -> Self {
        let stage = error.stage();
        Self::new(
            AlertCategory::Error,
            AlertSeverity::Error,
            format!("Error in {}: {}", source_name, stage),
            format!("Stage '{}' failed for source '{}': {}", stage, source_name, error),
            source_name,
        )
        .with_metadata("source_name", source_name)
        .with_metadata("operation", stage)
        .with_metadata("error", error.to_string())
        .with_tag("error")
        .with_tag(source_name)
    }

    /// A component reports its status. Anything other than `healthy` is a
    /// warning.
    pub fn health(component: &str, status: &str, metadata: Map<String, Value>) -> Self {
        let severity = if status == "healthy" {
            AlertSeverity::Info
        } else {
            AlertSeverity::Warning
        };
        let mut alert = Self::new(
            AlertCategory::HealthCheck,
            severity,
            format!("Health check: {} is {}", component, status),
            format!("Component {} reported status: {}", component, status),
            component,
        )
        .with_tag("health_check")
        .with_tag(component);
        alert.metadata = metadata;
        alert
    }

    /// Fixed alert used to verify channel configuration.
    pub fn test() -> Self {
        Self::new(
            AlertCategory::Test,
            AlertSeverity::Info,
            "Test alert",
            "This is a test alert to verify channel configuration",
            "tidewatch",
        )
        .with_metadata("test", json!(true))
        .with_tag("test")
    }
}
