//! HTTP plumbing shared by probes, fetches, telemetry and webhooks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, ProbeError};
use crate::freshness::{parse_last_modified, FreshnessProbe};
use crate::pipeline::PayloadFetcher;
use crate::{CoreError, Result};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const ALERT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the client every HTTP component shares.
///
/// Request timeouts are applied per call; only the connect timeout is global.
pub fn tidewatch_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("tidewatch/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| CoreError::HttpClient {
            cause: e.to_string(),
        })
}

/// Check that `target` is an absolute http(s) URL with a host.
pub fn validate_target(target: &str) -> std::result::Result<Url, String> {
    if target.trim().is_empty() {
        return Err("URL is empty".to_string());
    }
    let url = Url::parse(target).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err("URL has no host".to_string()),
    }
}

/// Probes and fetches sources over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    client: reqwest::Client,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl HttpSourceClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            probe_timeout: PROBE_TIMEOUT,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, probe_timeout: Duration, fetch_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self.fetch_timeout = fetch_timeout;
        self
    }
}

#[async_trait]
impl FreshnessProbe for HttpSourceClient {
    /// `HEAD` the target and read its `Last-Modified` header.
    ///
    /// A response without the header is treated as modified just now.
    async fn probe(&self, target: &str) -> std::result::Result<DateTime<Utc>, ProbeError> {
        let url = validate_target(target).map_err(|reason| ProbeError::InvalidTarget {
            target: target.to_string(),
            reason,
        })?;

        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| ProbeError::Transport {
                target: target.to_string(),
                cause: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProbeError::Status {
                target: target.to_string(),
                status: response.status().as_u16(),
            });
        }

        let Some(header) = response.headers().get(LAST_MODIFIED) else {
            warn!(target, "no Last-Modified header, treating source as fresh");
            return Ok(Utc::now());
        };

        let value = header.to_str().map_err(|_| ProbeError::InvalidTimestamp {
            target: target.to_string(),
            value: String::from_utf8_lossy(header.as_bytes()).into_owned(),
        })?;

        parse_last_modified(value).ok_or_else(|| ProbeError::InvalidTimestamp {
            target: target.to_string(),
            value: value.to_string(),
        })
    }
}

#[async_trait]
impl PayloadFetcher for HttpSourceClient {
    async fn fetch(&self, target: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let url = validate_target(target).map_err(|reason| FetchError::InvalidTarget {
            target: target.to_string(),
            reason,
        })?;

        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                target: target.to_string(),
                cause: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                target: target.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Body {
            target: target.to_string(),
            cause: e.to_string(),
        })?;
        debug!(target, bytes = body.len(), "fetched payload");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_target() {
        assert!(validate_target("https://data.example.com/feed.json").is_ok());
        assert!(validate_target("http://127.0.0.1:8080/x").is_ok());

        assert_eq!(validate_target("").unwrap_err(), "URL is empty");
        assert!(validate_target("not a url").is_err());
        assert_eq!(
            validate_target("ftp://files.example.com/data.csv").unwrap_err(),
            "unsupported scheme 'ftp'"
        );
        assert!(validate_target("file:///etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_probe_rejects_invalid_target_without_network() {
        let client = HttpSourceClient::new(tidewatch_http_client().unwrap());
        let err = client.probe("ftp://nowhere/data").await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidTarget { .. }));

        let err = client.fetch("").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidTarget { .. }));
    }
}
