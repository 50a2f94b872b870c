use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn, Level};

use super::{AlertChannel, AlertEvent, AlertSeverity};
use crate::error::ChannelError;
use crate::http::{validate_target, ALERT_TIMEOUT};

async fn post_json(
    client: &reqwest::Client,
    channel: &str,
    url: &str,
    timeout: Duration,
    body: &serde_json::Value,
    headers: &[(&str, String)],
) -> Result<(), ChannelError> {
    let url = validate_target(url).map_err(|reason| ChannelError::InvalidUrl {
        channel: channel.to_string(),
        url: url.to_string(),
        reason,
    })?;

    let mut request = client.post(url).timeout(timeout).json(body);
    for (name, value) in headers {
        request = request.header(*name, value);
    }

    let response = request.send().await.map_err(|e| ChannelError::Transport {
        channel: channel.to_string(),
        cause: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ChannelError::Status {
            channel: channel.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// Posts `{"alert": ..., "channel": name}` to a generic webhook.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    name: String,
    url: Option<String>,
    api_key: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookChannel {
    pub fn new(name: impl Into<String>, url: Option<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url,
            api_key: None,
            token: None,
            client,
            timeout: ALERT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ChannelError::MissingSetting {
                channel: self.name.clone(),
                setting: "url".to_string(),
            })?;

        let mut headers = Vec::new();
        if let Some(api_key) = &self.api_key {
            headers.push(("Authorization", format!("Bearer {}", api_key)));
        }
        if let Some(token) = &self.token {
            headers.push(("X-Auth-Token", token.clone()));
        }

        let body = json!({ "alert": alert, "channel": self.name });
        post_json(&self.client, &self.name, url, self.timeout, &body, &headers).await?;
        debug!(channel = %self.name, "webhook alert delivered");
        Ok(())
    }
}

/// Posts an attachment-style message to a chat incoming webhook.
#[derive(Debug, Clone)]
pub struct ChatWebhookChannel {
    name: String,
    webhook_url: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl ChatWebhookChannel {
    pub fn new(
        name: impl Into<String>,
        webhook_url: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            webhook_url,
            client,
            timeout: ALERT_TIMEOUT,
        }
    }

    pub fn color(severity: AlertSeverity) -> &'static str {
        match severity {
            AlertSeverity::Critical | AlertSeverity::Error => "danger",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Info => "good",
        }
    }

    pub fn payload(alert: &AlertEvent) -> serde_json::Value {
        json!({
            "username": "Tidewatch",
            "attachments": [{
                "color": Self::color(alert.severity),
                "title": alert.title,
                "text": alert.message,
                "ts": alert.timestamp.timestamp(),
                "footer": "Tidewatch",
                "fields": [
                    {"title": "Source", "value": alert.source, "short": true},
                    {"title": "Type", "value": alert.category.to_string(), "short": true},
                    {"title": "Severity", "value": alert.severity.to_string(), "short": true},
                ],
            }],
        })
    }
}

#[async_trait]
impl AlertChannel for ChatWebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        let url = self
            .webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ChannelError::MissingSetting {
                channel: self.name.clone(),
                setting: "webhook_url".to_string(),
            })?;

        post_json(
            &self.client,
            &self.name,
            url,
            self.timeout,
            &Self::payload(alert),
            &[],
        )
        .await?;
        debug!(channel = %self.name, "chat alert delivered");
        Ok(())
    }
}

/// Writes alerts to the tracing log.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
    level: Option<String>,
}

impl LogChannel {
    pub fn new(name: impl Into<String>, level: Option<String>) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }

    /// The configured level if set, otherwise one derived from severity.
    pub fn level_for(&self, severity: AlertSeverity) -> Level {
        match self.level.as_deref() {
            Some(level) => parse_level(level),
            None => match severity {
                AlertSeverity::Info => Level::INFO,
                AlertSeverity::Warning => Level::WARN,
                AlertSeverity::Error | AlertSeverity::Critical => Level::ERROR,
            },
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" | "fatal" => Level::ERROR,
        _ => Level::WARN,
    }
}

#[async_trait]
impl AlertChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        let metadata = serde_json::Value::Object(alert.metadata.clone());
        let tags = alert.tags.join(",");
        let channel = self.name.as_str();
        macro_rules! emit {
            ($mac:ident) => {
                $mac!(
                    channel,
                    alert_type = %alert.category,
                    severity = %alert.severity,
                    source = %alert.source,
                    title = %alert.title,
                    tags = %tags,
                    metadata = %metadata,
                    "{}",
                    alert.message
                )
            };
        }
        match self.level_for(alert.severity) {
            Level::ERROR => emit!(error),
            Level::WARN => emit!(warn),
            Level::INFO => emit!(info),
            _ => emit!(debug),
        }
        Ok(())
    }
}
