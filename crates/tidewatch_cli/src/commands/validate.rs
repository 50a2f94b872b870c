use std::path::Path;

use miette::Result;
use tidewatch_core::config::ChannelKind;
use tidewatch_core::TidewatchConfig;

use crate::output::Output;

/// Validate the configuration and describe what it would run.
pub fn validate(config: &TidewatchConfig, path: &Path, output: &Output) -> Result<()> {
    config.ensure_valid(path)?;

    output.success(&format!("{} is valid", path.display()));
    output.print("");

    output.section("Global");
    output.kv("name", &config.global.name);
    output.kv(
        "interval",
        &humantime::format_duration(config.global.interval).to_string(),
    );
    output.kv("workers", &config.global.worker_count.to_string());
    output.kv("metrics", &config.global.enable_metrics.to_string());
    output.kv("alerts", &config.global.enable_alerts.to_string());
    output.kv("events endpoint", &config.telemetry.events_endpoint());
    output.print("");

    output.section("Sources");
    for source in &config.sources {
        let staleness = if source.staleness.enabled {
            format!(
                "stale after {}, {}",
                humantime::format_duration(source.staleness.threshold),
                source.staleness.behavior
            )
        } else {
            "no staleness check".to_string()
        };
        let state = if source.enabled { "" } else { " (disabled)" };
        output.kv(
            &source.name,
            &format!("{} [{}] {}{}", source.url, source.format, staleness, state),
        );
    }
    output.print("");

    output.section("Alert channels");
    if config.alerts.channels.is_empty() {
        output.status("none configured");
    }
    for channel in &config.alerts.channels {
        let target = match &channel.kind {
            ChannelKind::Webhook { url, .. } => url.clone().unwrap_or_default(),
            ChannelKind::Chat { webhook_url } => webhook_url.clone().unwrap_or_default(),
            ChannelKind::Log { level } => {
                format!("level {}", level.as_deref().unwrap_or("by severity"))
            }
        };
        let state = if channel.enabled { "" } else { " (disabled)" };
        output.kv(
            &channel.name,
            &format!("{} {}{}", channel.kind.type_name(), target, state),
        );
    }

    Ok(())
}
