use std::time::Duration;

use crate::error::SourceError;
use crate::freshness::FreshnessResult;

/// What happened to one source during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub source: String,
    /// Records emitted to the batcher.
    pub records: usize,
    pub duration: Duration,
    pub stale: bool,
    /// Stale data under a skip policy; nothing was fetched.
    pub skipped: bool,
    /// The source was disabled and never queued.
    pub disabled: bool,
    pub freshness: Option<FreshnessResult>,
    pub error: Option<SourceError>,
}

impl CycleOutcome {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            records: 0,
            duration: Duration::ZERO,
            stale: false,
            skipped: false,
            disabled: false,
            freshness: None,
            error: None,
        }
    }

    pub fn disabled(source: impl Into<String>) -> Self {
        Self {
            disabled: true,
            ..Self::new(source)
        }
    }

    pub fn failed(source: impl Into<String>, error: SourceError, duration: Duration) -> Self {
        Self {
            duration,
            error: Some(error),
            ..Self::new(source)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The freshness check asked for a staleness alert.
    pub fn should_alert(&self) -> bool {
        self.freshness.as_ref().is_some_and(|f| f.should_alert)
    }
}

/// Aggregate of one cycle, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub sources: usize,
    pub records: usize,
    pub errors: usize,
    pub stale: usize,
    pub skipped: usize,
    pub duration: Duration,
    pub outcomes: Vec<CycleOutcome>,
}

impl CycleSummary {
    pub fn new(outcomes: Vec<CycleOutcome>, duration: Duration) -> Self {
        let active = outcomes.iter().filter(|o| !o.disabled);
        let (mut sources, mut records, mut errors, mut stale, mut skipped) = (0, 0, 0, 0, 0);
        for outcome in active {
            sources += 1;
            records += outcome.records;
            errors += usize::from(outcome.error.is_some());
            stale += usize::from(outcome.stale);
            skipped += usize::from(outcome.skipped);
        }
        Self {
            sources,
            records,
            errors,
            stale,
            skipped,
            duration,
            outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn test_summary_ignores_disabled_sources() {
        let mut ok = CycleOutcome::new("a");
        ok.records = 5;
        let mut stale = CycleOutcome::new("b");
        stale.stale = true;
        stale.skipped = true;
        let failed = CycleOutcome::failed(
            "c",
            FetchError::Status {
                target: "http://host/c".to_string(),
                status: 500,
            }
            .into(),
            Duration::from_millis(3),
        );

        let summary = CycleSummary::new(
            vec![ok, stale, failed, CycleOutcome::disabled("d")],
            Duration::from_secs(1),
        );
        assert_eq!(summary.sources, 3);
        assert_eq!(summary.records, 5);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.stale, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.outcomes.len(), 4);
    }
}
