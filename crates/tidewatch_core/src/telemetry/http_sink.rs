use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{names, Measurement, PendingRecord, TelemetrySink};
use crate::config::TelemetryConfig;
use crate::error::{BatchKind, SubmissionError};
use crate::http::SUBMIT_TIMEOUT;

/// Submits batches to an HTTP telemetry backend.
///
/// Records go to the events endpoint as a JSON array of flat objects,
/// authenticated with `X-Insert-Key`. Measurements go to the metrics endpoint
/// wrapped in a common block, authenticated with `Api-Key`.
#[derive(Debug, Clone)]
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    events_url: String,
    metrics_url: String,
    api_key: String,
    service_name: String,
    host: String,
    interval_ms: u64,
    timeout: Duration,
}

impl HttpTelemetrySink {
    pub fn new(client: reqwest::Client, config: &TelemetryConfig, service_name: &str) -> Self {
        Self {
            client,
            events_url: config.events_endpoint(),
            metrics_url: config.metrics_endpoint(),
            api_key: config.api_key.clone(),
            service_name: service_name.to_string(),
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            interval_ms: config.interval_ms,
            timeout: SUBMIT_TIMEOUT,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Submit a single health gauge to confirm the backend accepts data.
    pub async fn health_check(&self) -> Result<(), SubmissionError> {
        let probe = Measurement::gauge(names::HEALTH_CHECK, 1.0)
            .with_attribute("check.type", "connectivity");
        self.submit_measurements(std::slice::from_ref(&probe)).await
    }

    fn encode_records(&self, records: &[PendingRecord]) -> Value {
        Value::Array(
            records
                .iter()
                .map(|pending| {
                    let mut event = Map::new();
                    for (name, value) in pending.record.iter() {
                        event.insert(name.clone(), json!(value));
                    }
                    event.insert("eventType".to_string(), json!(pending.category));
                    event.insert("timestamp".to_string(), json!(pending.timestamp.timestamp()));
                    event.insert(
                        "collector.version".to_string(),
                        json!(env!("CARGO_PKG_VERSION")),
                    );
                    Value::Object(event)
                })
                .collect(),
        )
    }

    fn encode_measurements(&self, measurements: &[Measurement]) -> Value {
        json!([{
            "common": {
                "timestamp": Utc::now().timestamp_millis(),
                "interval.ms": self.interval_ms,
                "attributes": {
                    "service.name": self.service_name,
                    "host": self.host,
                }
            },
            "metrics": measurements,
        }])
    }

    async fn post(
        &self,
        kind: BatchKind,
        url: &str,
        auth_header: &str,
        body: &Value,
    ) -> Result<(), SubmissionError> {
        let response = self
            .client
            .post(url)
            .header(auth_header, &self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport {
                kind,
                cause: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Rejected {
                kind,
                status: status.as_u16(),
            });
        }
        debug!(%kind, url, status = status.as_u16(), "telemetry batch accepted");
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn submit_records(&self, records: &[PendingRecord]) -> Result<(), SubmissionError> {
        let body = self.encode_records(records);
        self.post(BatchKind::Records, &self.events_url, "X-Insert-Key", &body)
            .await
    }

    async fn submit_measurements(&self, measurements: &[Measurement]) -> Result<(), SubmissionError> {
        let body = self.encode_measurements(measurements);
        self.post(BatchKind::Measurements, &self.metrics_url, "Api-Key", &body)
            .await
    }
}
