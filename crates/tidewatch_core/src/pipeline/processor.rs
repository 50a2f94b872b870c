use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{CycleOutcome, PayloadFetcher};
use crate::config::SourceSpec;
use crate::error::{FetchError, SourceError};
use crate::freshness::{FreshnessChecker, FreshnessProbe, FreshnessResult};
use crate::telemetry::{names, Measurement, TelemetryBatcher};
use crate::transform::{enrich, transform, Record, SOURCE_NAME_ATTRIBUTE};

/// Runs the per-source pipeline: freshness gate, fetch, transform, enrich,
/// emit.
pub struct SourceProcessor {
    checker: FreshnessChecker,
    fetcher: Arc<dyn PayloadFetcher>,
    batcher: Arc<TelemetryBatcher>,
    emit_metrics: bool,
}

impl SourceProcessor {
    pub fn new(
        probe: Arc<dyn FreshnessProbe>,
        fetcher: Arc<dyn PayloadFetcher>,
        batcher: Arc<TelemetryBatcher>,
    ) -> Self {
        Self {
            checker: FreshnessChecker::new(probe),
            fetcher,
            batcher,
            emit_metrics: true,
        }
    }

    pub fn with_metrics(mut self, emit_metrics: bool) -> Self {
        self.emit_metrics = emit_metrics;
        self
    }

    /// Process one source. Never fails; errors are captured in the outcome.
    pub async fn process(&self, spec: &SourceSpec) -> CycleOutcome {
        let started = Instant::now();
        let mut outcome = CycleOutcome::new(&spec.name);

        if spec.staleness.enabled {
            let target = spec.freshness_target();
            let freshness = self.checker.check(target, &spec.staleness).await;

            if let Some(error) = freshness.error.clone() {
                outcome.error = Some(error.into());
                outcome.freshness = Some(freshness);
                outcome.duration = started.elapsed();
                self.record_processing(spec, &outcome);
                return outcome;
            }

            self.record_freshness(spec, &freshness);
            outcome.stale = freshness.is_stale;
            let skip = freshness.should_skip;
            outcome.freshness = Some(freshness);

            if skip {
                info!(source = %spec.name, target, "data is stale, skipping source this cycle");
                outcome.skipped = true;
                outcome.duration = started.elapsed();
                self.record_processing(spec, &outcome);
                return outcome;
            }
        }

        match self.collect(spec).await {
            Ok(records) => {
                outcome.records = records.len();
                self.batcher.add_records(&spec.event_type, records);
            }
            Err(error) => {
                warn!(source = %spec.name, stage = error.stage(), error = %error, "source processing failed");
                outcome.error = Some(error);
            }
        }

        outcome.duration = started.elapsed();
        self.record_processing(spec, &outcome);
        debug!(
            source = %spec.name,
            records = outcome.records,
            duration_ms = outcome.duration.as_millis() as u64,
            "source processed"
        );
        outcome
    }

    async fn collect(&self, spec: &SourceSpec) -> Result<Vec<Record>, SourceError> {
        let payload = self.fetch_with_fallback(spec).await?;
        let mut records = transform(&payload, spec.format, spec.filter.as_ref())?;
        enrich(&mut records, spec, Utc::now());
        Ok(records)
    }

    /// Fetch the primary target, falling back once to `fallback_url` if set.
    async fn fetch_with_fallback(&self, spec: &SourceSpec) -> Result<Vec<u8>, FetchError> {
        let primary = match self.fetcher.fetch(&spec.url).await {
            Ok(payload) => return Ok(payload),
            Err(error) => error,
        };
        let Some(fallback) = spec.fallback_url.as_deref() else {
            return Err(primary);
        };

        warn!(
            source = %spec.name,
            error = %primary,
            fallback,
            "primary fetch failed, trying fallback"
        );
        self.fetcher.fetch(fallback).await
    }

    fn record_freshness(&self, spec: &SourceSpec, freshness: &FreshnessResult) {
        if !self.emit_metrics {
            return;
        }
        let tagged = |m: Measurement| {
            m.with_attribute(SOURCE_NAME_ATTRIBUTE, spec.name.as_str())
                .with_attribute("staleness.behavior", freshness.behavior.to_string())
                .with_attribute("staleness.stale", freshness.is_stale)
        };
        self.batcher.add_measurements([
            tagged(Measurement::gauge(
                names::STALENESS_AGE,
                freshness.age.as_secs_f64(),
            )),
            tagged(Measurement::gauge(
                names::STALENESS_THRESHOLD,
                freshness.threshold.as_secs_f64(),
            )),
            tagged(Measurement::gauge(
                names::STALENESS_RATIO,
                freshness.age_ratio(),
            )),
        ]);
    }

    fn record_processing(&self, spec: &SourceSpec, outcome: &CycleOutcome) {
        if !self.emit_metrics {
            return;
        }
        let status = if outcome.is_success() { 1.0 } else { 0.0 };
        let tagged = |m: Measurement| {
            m.with_attribute(SOURCE_NAME_ATTRIBUTE, spec.name.as_str())
                .with_attribute("source.format", spec.format.to_string())
        };
        self.batcher.add_measurements([
            tagged(Measurement::gauge(
                names::PROCESSING_DURATION,
                outcome.duration.as_secs_f64(),
            )),
            tagged(Measurement::counter(
                names::PROCESSING_RECORDS,
                outcome.records as f64,
            )),
            tagged(Measurement::gauge(names::PROCESSING_STATUS, status)),
        ]);
    }
}
