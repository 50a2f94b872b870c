//! Alert fan-out to webhooks, chat webhooks and the log.

mod channels;
mod dispatcher;
mod types;

use async_trait::async_trait;

use crate::error::ChannelError;

pub use channels::{ChatWebhookChannel, LogChannel, WebhookChannel};
pub use dispatcher::AlertDispatcher;
pub use types::{AlertCategory, AlertEvent, AlertSeverity};

/// One alert destination.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, alert: &AlertEvent) -> Result<(), ChannelError>;
}
