use std::sync::Arc;

use miette::Result;
use tidewatch_core::alerts::AlertDispatcher;
use tidewatch_core::telemetry::{HttpTelemetrySink, TelemetryBatcher};
use tidewatch_core::{
    tidewatch_http_client, CycleRunner, HttpSourceClient, SourceProcessor, SourceWorkerPool,
    TidewatchConfig,
};

/// Everything a command needs, wired from one configuration.
pub struct Components {
    pub runner: Arc<CycleRunner>,
    pub alerts: Arc<AlertDispatcher>,
    pub sink: Arc<HttpTelemetrySink>,
}

impl Components {
    pub fn build(config: &TidewatchConfig) -> Result<Self> {
        let client = tidewatch_http_client()?;

        let sink = Arc::new(HttpTelemetrySink::new(
            client.clone(),
            &config.telemetry,
            &config.global.name,
        ));
        let batcher = Arc::new(TelemetryBatcher::new(sink.clone()));

        let sources = Arc::new(HttpSourceClient::new(client.clone()));
        let processor = Arc::new(
            SourceProcessor::new(sources.clone(), sources, batcher.clone())
                .with_metrics(config.global.enable_metrics),
        );
        let pool = SourceWorkerPool::new(processor, config.global.worker_count);

        let alerts = Arc::new(AlertDispatcher::from_config(
            &config.alerts.channels,
            client,
        ));

        let runner = Arc::new(
            CycleRunner::new(pool, batcher, alerts.clone())
                .with_alerts_enabled(config.global.enable_alerts)
                .with_metrics_enabled(config.global.enable_metrics),
        );

        Ok(Self {
            runner,
            alerts,
            sink,
        })
    }
}
