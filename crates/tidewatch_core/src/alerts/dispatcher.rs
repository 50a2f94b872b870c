use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{AlertChannel, AlertEvent, ChatWebhookChannel, LogChannel, WebhookChannel};
use crate::config::{AlertChannelConfig, ChannelKind};
use crate::error::DispatchError;

struct ChannelEntry {
    channel: Arc<dyn AlertChannel>,
    enabled: bool,
}

/// Fans alerts out to every enabled channel.
#[derive(Default)]
pub struct AlertDispatcher {
    channels: Vec<ChannelEntry>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build channels from configuration, sharing one HTTP client.
    pub fn from_config(configs: &[AlertChannelConfig], client: reqwest::Client) -> Self {
        let mut dispatcher = Self::new();
        for config in configs {
            let channel: Arc<dyn AlertChannel> = match &config.kind {
                ChannelKind::Webhook {
                    url,
                    api_key,
                    token,
                } => Arc::new(
                    WebhookChannel::new(&config.name, url.clone(), client.clone())
                        .with_api_key(api_key.clone())
                        .with_token(token.clone()),
                ),
                ChannelKind::Chat { webhook_url } => Arc::new(ChatWebhookChannel::new(
                    &config.name,
                    webhook_url.clone(),
                    client.clone(),
                )),
                ChannelKind::Log { level } => {
                    Arc::new(LogChannel::new(&config.name, level.clone()))
                }
            };
            dispatcher = dispatcher.with_channel(channel, config.enabled);
        }
        dispatcher
    }

    pub fn with_channel(mut self, channel: Arc<dyn AlertChannel>, enabled: bool) -> Self {
        self.channels.push(ChannelEntry { channel, enabled });
        self
    }

    pub fn enabled_channels(&self) -> impl Iterator<Item = &str> {
        self.channels
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.channel.name())
    }

    /// Deliver `alert` to every enabled channel.
    ///
    /// Channels are attempted concurrently and independently. With no
    /// enabled channels this is a successful no-op.
    pub async fn send(&self, alert: &AlertEvent) -> Result<(), DispatchError> {
        let targets: Vec<&Arc<dyn AlertChannel>> = self
            .channels
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| &entry.channel)
            .collect();

        if targets.is_empty() {
            debug!(title = %alert.title, "no alert channels enabled");
            return Ok(());
        }

        let results = join_all(targets.iter().map(|channel| channel.deliver(alert))).await;

        let failures: Vec<_> = results.into_iter().filter_map(|r| r.err()).collect();
        for failure in &failures {
            warn!(channel = failure.channel(), error = %failure, "alert delivery failed");
        }

        if failures.is_empty() {
            debug!(
                category = %alert.category,
                channels = targets.len(),
                "alert dispatched"
            );
            Ok(())
        } else {
            Err(DispatchError { failures })
        }
    }

    /// Send the fixed test alert through every enabled channel.
    pub async fn test_channels(&self) -> Result<(), DispatchError> {
        info!(
            channels = ?self.enabled_channels().collect::<Vec<_>>(),
            "sending test alert"
        );
        self.send(&AlertEvent::test()).await
    }
}
