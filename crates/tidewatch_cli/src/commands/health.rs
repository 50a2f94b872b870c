use miette::Result;
use tidewatch_core::{CoreError, TidewatchConfig};

use crate::components::Components;
use crate::output::Output;

/// Submit a single health measurement to the telemetry backend.
pub async fn check(config: &TidewatchConfig, output: &Output) -> Result<()> {
    let components = Components::build(config)?;

    output.section("Telemetry health check");
    output.kv("metrics endpoint", &config.telemetry.metrics_endpoint());

    components
        .sink
        .health_check()
        .await
        .map_err(|cause| CoreError::TelemetryError {
            operation: "health check".to_string(),
            cause,
        })?;

    output.success("Telemetry backend accepted the health measurement");
    Ok(())
}
