use miette::{IntoDiagnostic, Result};
use tidewatch_core::{CycleScheduler, CycleSummary, TidewatchConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::components::Components;
use crate::output::Output;

/// Run collection cycles until interrupted, or a single cycle with `once`.
pub async fn run(config: TidewatchConfig, once: bool, output: &Output) -> Result<()> {
    let components = Components::build(&config)?;

    if once {
        let summary = components.runner.run_cycle(&config.sources).await;
        print_summary(&summary, output);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let handle = CycleScheduler::new(
        components.runner.clone(),
        config.sources.clone(),
        config.global.interval,
    )
    .with_shutdown_grace(config.global.shutdown_grace)
    .with_component(config.global.name.clone())
    .start(cancel.clone());

    output.success(&format!(
        "Monitoring {} sources every {}",
        config.enabled_sources().count(),
        humantime::format_duration(config.global.interval)
    ));
    output.status("Press Ctrl+C to stop");

    shutdown_signal().await;
    info!("shutdown signal received");
    cancel.cancel();
    handle.await.into_diagnostic()?;

    let stats = components.runner.batcher().stats();
    output.success("Stopped");
    output.kv("records sent", &stats.records_sent.to_string());
    output.kv("measurements sent", &stats.measurements_sent.to_string());
    output.kv(
        "submit errors",
        &(stats.record_errors + stats.measurement_errors).to_string(),
    );
    Ok(())
}

fn print_summary(summary: &CycleSummary, output: &Output) {
    output.section("Cycle summary");
    output.kv("sources", &summary.sources.to_string());
    output.kv("records", &summary.records.to_string());
    output.kv("stale", &summary.stale.to_string());
    output.kv("skipped", &summary.skipped.to_string());
    output.kv("errors", &summary.errors.to_string());
    output.kv(
        "duration",
        &humantime::format_duration(std::time::Duration::from_millis(
            summary.duration.as_millis() as u64,
        ))
        .to_string(),
    );

    for outcome in summary.outcomes.iter().filter(|o| !o.disabled) {
        match &outcome.error {
            Some(error) => output.error(&format!("{}: {}", outcome.source, error)),
            None if outcome.skipped => {
                output.warning(&format!("{}: stale, skipped", outcome.source))
            }
            None => output.success(&format!("{}: {} records", outcome.source, outcome.records)),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
