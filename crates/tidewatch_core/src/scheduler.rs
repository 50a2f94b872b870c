//! Fixed-interval cycle scheduling with graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::alerts::AlertEvent;
use crate::config::SourceSpec;
use crate::pipeline::CycleRunner;

/// Clears the in-progress flag when a cycle task ends, including on abort.
struct CycleGuard(Arc<AtomicBool>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ticks every `interval` and runs a cycle on each tick.
///
/// A tick that fires while the previous cycle is still running is skipped,
/// and missed ticks are not queued. On cancellation the in-flight cycle gets
/// `shutdown_grace` to finish before it is aborted; the batcher is then
/// flushed one last time.
pub struct CycleScheduler {
    runner: Arc<CycleRunner>,
    sources: Arc<[SourceSpec]>,
    interval: Duration,
    shutdown_grace: Duration,
    component: String,
}

impl CycleScheduler {
    pub fn new(runner: Arc<CycleRunner>, sources: Vec<SourceSpec>, interval: Duration) -> Self {
        Self {
            runner,
            sources: sources.into(),
            interval,
            shutdown_grace: Duration::from_secs(10),
            component: "tidewatch".to_string(),
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Name used as the source of health alerts.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// Spawn the scheduler loop.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(
            sources = self.sources.len(),
            interval = %humantime::format_duration(self.interval),
            "scheduler started"
        );
        self.send_health(
            "healthy",
            json!({
                "event": "started",
                "sources": self.sources.len(),
                "interval": humantime::format_duration(self.interval).to_string(),
            }),
        )
        .await;

        let running = Arc::new(AtomicBool::new(false));
        let mut current: Option<JoinHandle<()>> = None;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if running
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                    {
                        warn!("previous cycle still running, skipping tick");
                        continue;
                    }
                    let guard = CycleGuard(running.clone());
                    let runner = self.runner.clone();
                    let sources = self.sources.clone();
                    current = Some(tokio::spawn(async move {
                        let _guard = guard;
                        runner.run_cycle(&sources).await;
                    }));
                }
            }
        }

        info!("shutdown requested, stopping scheduler");
        if let Some(mut handle) = current.take() {
            if !handle.is_finished() {
                info!(
                    grace = %humantime::format_duration(self.shutdown_grace),
                    "waiting for in-flight cycle"
                );
                match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(error = %e, "in-flight cycle failed"),
                    Err(_) => {
                        warn!("in-flight cycle exceeded shutdown grace, aborting");
                        handle.abort();
                    }
                }
            }
        }

        if let Err(e) = self.runner.batcher().flush().await {
            error!(error = %e, "final telemetry flush failed");
        }

        self.send_health("stopped", json!({ "event": "stopped" })).await;
        info!("scheduler stopped");
    }

    async fn send_health(&self, status: &str, metadata: serde_json::Value) {
        if !self.runner.alerts_enabled() {
            return;
        }
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => Map::new(),
        };
        let alert = AlertEvent::health(&self.component, status, metadata);
        if let Err(e) = self.runner.alerts().send(&alert).await {
            warn!(status, error = %e, "failed to send health alert");
        }
    }
}
