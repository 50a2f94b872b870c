//! Source freshness: probing modification times and deciding what to do with
//! stale data.
//!
//! A [`FreshnessProbe`] asks the source when it last changed. The evaluator
//! compares that against the source's [`StalenessPolicy`] and produces a
//! [`FreshnessResult`] telling the pipeline whether to proceed, skip the
//! source, or proceed and raise an alert.

mod evaluator;
mod probe;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use evaluator::{evaluate, evaluate_at, FreshnessResult};
pub use probe::{parse_last_modified, FreshnessChecker, FreshnessProbe};

/// Default staleness threshold when a policy leaves it out.
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// What to do with a source whose data is older than its threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalenessBehavior {
    /// Do not fetch or emit anything this cycle.
    Skip,
    /// Process normally and raise a staleness alert.
    Alert,
    /// Process normally.
    #[default]
    Continue,
}

impl std::fmt::Display for StalenessBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StalenessBehavior::Skip => write!(f, "skip"),
            StalenessBehavior::Alert => write!(f, "alert"),
            StalenessBehavior::Continue => write!(f, "continue"),
        }
    }
}

/// Per-source staleness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StalenessPolicy {
    #[serde(default)]
    pub enabled: bool,

    #[serde(
        default = "default_threshold",
        with = "crate::utils::serde_duration"
    )]
    pub threshold: Duration,

    #[serde(default)]
    pub behavior: StalenessBehavior,

    /// Overrides the target probed for freshness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_url: Option<String>,
}

fn default_threshold() -> Duration {
    DEFAULT_STALENESS_THRESHOLD
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: DEFAULT_STALENESS_THRESHOLD,
            behavior: StalenessBehavior::default(),
            check_url: None,
        }
    }
}

impl StalenessPolicy {
    /// An enabled policy with the given threshold and behavior.
    pub fn new(threshold: Duration, behavior: StalenessBehavior) -> Self {
        Self {
            enabled: true,
            threshold,
            behavior,
            check_url: None,
        }
    }

    pub fn with_check_url(mut self, check_url: impl Into<String>) -> Self {
        self.check_url = Some(check_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults_when_only_enabled() {
        let policy: StalenessPolicy = toml::from_str("enabled = true").unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.threshold, DEFAULT_STALENESS_THRESHOLD);
        assert_eq!(policy.behavior, StalenessBehavior::Continue);
        assert!(policy.check_url.is_none());
    }

    #[test]
    fn test_unknown_behavior_rejected_at_parse() {
        let result = toml::from_str::<StalenessPolicy>("enabled = true\nbehavior = \"panic\"");
        assert!(result.is_err());
    }
}
