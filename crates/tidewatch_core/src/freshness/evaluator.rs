use std::time::Duration;

use chrono::{DateTime, Utc};

use super::StalenessBehavior;
use crate::error::ProbeError;

/// Outcome of one freshness check.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessResult {
    /// Age of the data at check time. Zero when the probe failed.
    pub age: Duration,
    /// Modification time reported by the source, if the probe succeeded.
    pub modified_at: Option<DateTime<Utc>>,
    pub threshold: Duration,
    pub behavior: StalenessBehavior,
    pub is_stale: bool,
    pub should_skip: bool,
    pub should_alert: bool,
    pub checked_at: DateTime<Utc>,
    pub error: Option<ProbeError>,
}

impl FreshnessResult {
    /// A result for a check whose probe failed.
    pub fn failed(
        threshold: Duration,
        behavior: StalenessBehavior,
        error: ProbeError,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            age: Duration::ZERO,
            modified_at: None,
            threshold,
            behavior,
            is_stale: false,
            should_skip: false,
            should_alert: false,
            checked_at,
            error: Some(error),
        }
    }

    /// Age divided by threshold; above 1.0 means stale.
    pub fn age_ratio(&self) -> f64 {
        if self.threshold.is_zero() {
            return 0.0;
        }
        self.age.as_secs_f64() / self.threshold.as_secs_f64()
    }
}

/// Evaluate a modification time against a threshold, as of now.
pub fn evaluate(
    modified_at: DateTime<Utc>,
    threshold: Duration,
    behavior: StalenessBehavior,
) -> FreshnessResult {
    evaluate_at(Utc::now(), modified_at, threshold, behavior)
}

/// Evaluate a modification time against a threshold, as of `now`.
///
/// Data is stale only when strictly older than the threshold. Modification
/// times in the future count as age zero.
pub fn evaluate_at(
    now: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    threshold: Duration,
    behavior: StalenessBehavior,
) -> FreshnessResult {
    let age = (now - modified_at).to_std().unwrap_or(Duration::ZERO);
    let is_stale = age > threshold;

    let (should_skip, should_alert) = match (is_stale, behavior) {
        (false, _) => (false, false),
        (true, StalenessBehavior::Skip) => (true, false),
        (true, StalenessBehavior::Alert) => (false, true),
        (true, StalenessBehavior::Continue) => (false, false),
    };

    FreshnessResult {
        age,
        modified_at: Some(modified_at),
        threshold,
        behavior,
        is_stale,
        should_skip,
        should_alert,
        checked_at: now,
        error: None,
    }
}
