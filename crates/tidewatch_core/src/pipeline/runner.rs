use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use super::{CycleSummary, SourceWorkerPool};
use crate::alerts::{AlertDispatcher, AlertEvent};
use crate::config::SourceSpec;
use crate::telemetry::{names, Measurement, TelemetryBatcher};

/// Drives one full collection cycle.
///
/// Runs every source through the pool, records cycle measurements, raises
/// staleness and error alerts, then flushes the telemetry batch.
pub struct CycleRunner {
    pool: SourceWorkerPool,
    batcher: Arc<TelemetryBatcher>,
    alerts: Arc<AlertDispatcher>,
    alerts_enabled: bool,
    metrics_enabled: bool,
}

impl CycleRunner {
    pub fn new(
        pool: SourceWorkerPool,
        batcher: Arc<TelemetryBatcher>,
        alerts: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            pool,
            batcher,
            alerts,
            alerts_enabled: true,
            metrics_enabled: true,
        }
    }

    pub fn with_alerts_enabled(mut self, enabled: bool) -> Self {
        self.alerts_enabled = enabled;
        self
    }

    pub fn with_metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn batcher(&self) -> &Arc<TelemetryBatcher> {
        &self.batcher
    }

    pub fn alerts(&self) -> &Arc<AlertDispatcher> {
        &self.alerts
    }

    pub fn alerts_enabled(&self) -> bool {
        self.alerts_enabled
    }

    pub async fn run_cycle(&self, sources: &[SourceSpec]) -> CycleSummary {
        let started = Instant::now();
        info!(
            sources = sources.len(),
            concurrency = self.pool.concurrency(),
            "starting collection cycle"
        );

        let outcomes = self.pool.run_cycle(sources).await;
        let summary = CycleSummary::new(outcomes, started.elapsed());

        if self.metrics_enabled {
            self.record_cycle(&summary);
        }

        if self.alerts_enabled {
            self.raise_alerts(sources, &summary).await;
        }

        if let Err(e) = self.batcher.flush().await {
            error!(error = %e, "failed to flush telemetry at end of cycle");
        }

        info!(
            sources = summary.sources,
            records = summary.records,
            errors = summary.errors,
            stale = summary.stale,
            skipped = summary.skipped,
            duration_ms = summary.duration.as_millis() as u64,
            "collection cycle complete"
        );
        summary
    }

    fn record_cycle(&self, summary: &CycleSummary) {
        self.batcher.add_measurements([
            Measurement::gauge(names::CYCLE_DURATION, summary.duration.as_secs_f64()),
            Measurement::counter(names::CYCLE_RECORDS, summary.records as f64),
            Measurement::counter(names::CYCLE_ERRORS, summary.errors as f64),
            Measurement::gauge(names::CYCLE_STALE_SOURCES, summary.stale as f64),
        ]);
    }

    async fn raise_alerts(&self, sources: &[SourceSpec], summary: &CycleSummary) {
        for (spec, outcome) in sources.iter().zip(&summary.outcomes) {
            let alert = if let Some(error) = &outcome.error {
                AlertEvent::source_error(&spec.name, error)
            } else if let Some(freshness) = outcome.freshness.as_ref().filter(|f| f.should_alert) {
                AlertEvent::staleness(&spec.name, spec.freshness_target(), freshness)
            } else {
                continue;
            };

            if let Err(e) = self.alerts.send(&alert).await {
                warn!(source = %spec.name, error = %e, "failed to dispatch alert");
            }
        }
    }
}
