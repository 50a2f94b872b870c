//! Tick overlap handling and graceful shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use common::{harness, FakeFetcher, FakeProbe, Harness};
use tidewatch_core::alerts::{AlertCategory, AlertSeverity};
use tidewatch_core::{CycleScheduler, SourceSpec};

fn sources() -> Vec<SourceSpec> {
    vec![SourceSpec::new("slow", "http://data.test/slow.json")]
}

#[tokio::test]
#[traced_test]
async fn test_overlapping_tick_is_skipped() {
    let Harness {
        runner, fetcher, ..
    } = harness(
        FakeProbe::default(),
        FakeFetcher::with_delay(Duration::from_millis(250)),
        1,
    );
    let cancel = CancellationToken::new();
    let handle = CycleScheduler::new(Arc::new(runner), sources(), Duration::from_millis(40))
        .start(cancel.clone());

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    // several ticks fired during the first slow cycle; only it ran
    assert_eq!(fetcher.fetch_count(), 1);
    assert!(logs_contain("previous cycle still running, skipping tick"));
}

#[tokio::test]
async fn test_shutdown_flushes_and_reports_health() {
    let Harness {
        runner,
        sink,
        channel,
        ..
    } = harness(FakeProbe::default(), FakeFetcher::default(), 1);
    let runner = Arc::new(runner);
    let cancel = CancellationToken::new();
    let handle = CycleScheduler::new(runner.clone(), sources(), Duration::from_secs(60))
        .with_component("tidewatch-test")
        .start(cancel.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    runner
        .batcher()
        .add_measurement(tidewatch_core::telemetry::Measurement::gauge("late", 1.0));
    cancel.cancel();
    handle.await.unwrap();

    assert!(sink.measurements.lock().iter().any(|m| m.name == "late"));
    assert_eq!(runner.batcher().pending_counts(), (0, 0));

    let alerts = channel.alerts.lock();
    let health: Vec<_> = alerts
        .iter()
        .filter(|a| a.category == AlertCategory::HealthCheck)
        .collect();
    assert_eq!(health.len(), 2);
    assert_eq!(health[0].severity, AlertSeverity::Info);
    assert_eq!(health[0].source, "tidewatch-test");
    assert_eq!(health[1].metadata["event"], "stopped");
}

#[tokio::test]
#[traced_test]
async fn test_cycle_past_grace_is_aborted() {
    let Harness { runner, sink, .. } = harness(
        FakeProbe::default(),
        FakeFetcher::with_delay(Duration::from_secs(30)),
        1,
    );
    let cancel = CancellationToken::new();
    let handle = CycleScheduler::new(Arc::new(runner), sources(), Duration::from_secs(60))
        .with_shutdown_grace(Duration::from_millis(100))
        .start(cancel.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler ignored its shutdown grace")
        .unwrap();

    assert!(logs_contain("exceeded shutdown grace"));
    assert!(sink.records.lock().is_empty());
}
