use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use super::{evaluate, FreshnessResult, StalenessPolicy};
use crate::error::ProbeError;

/// Asks a source when its data last changed, without downloading it.
#[async_trait]
pub trait FreshnessProbe: Send + Sync {
    async fn probe(&self, target: &str) -> Result<DateTime<Utc>, ProbeError>;
}

/// Probe plus evaluation for one source's policy.
#[derive(Clone)]
pub struct FreshnessChecker {
    probe: Arc<dyn FreshnessProbe>,
}

impl FreshnessChecker {
    pub fn new(probe: Arc<dyn FreshnessProbe>) -> Self {
        Self { probe }
    }

    /// Probe `target` and evaluate it against `policy`.
    ///
    /// Probe failures are carried inside the result rather than returned, so
    /// callers always get a decision to record.
    pub async fn check(&self, target: &str, policy: &StalenessPolicy) -> FreshnessResult {
        match self.probe.probe(target).await {
            Ok(modified_at) => {
                let result = evaluate(modified_at, policy.threshold, policy.behavior);
                debug!(
                    target,
                    age_secs = result.age.as_secs(),
                    threshold_secs = policy.threshold.as_secs(),
                    stale = result.is_stale,
                    "freshness checked"
                );
                result
            }
            Err(error) => {
                warn!(target, error = %error, "freshness probe failed");
                FreshnessResult::failed(policy.threshold, policy.behavior, error, Utc::now())
            }
        }
    }
}

/// Parse an HTTP `Last-Modified` value.
///
/// Accepts RFC 1123/2822 dates (`GMT` or numeric offsets), RFC 3339, RFC 850
/// and asctime forms.
pub fn parse_last_modified(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // RFC 850: "Sunday, 06-Nov-94 08:49:37 GMT"
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(parsed.and_utc());
    }
    // asctime: "Sun Nov  6 08:49:37 1994"
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y") {
        return Some(parsed.and_utc());
    }
    None
}
