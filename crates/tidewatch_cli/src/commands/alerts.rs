use miette::Result;
use tidewatch_core::{CoreError, TidewatchConfig};

use crate::components::Components;
use crate::output::Output;

/// Send the test alert through every enabled channel.
pub async fn test_channels(config: &TidewatchConfig, output: &Output) -> Result<()> {
    let components = Components::build(config)?;
    let channels: Vec<&str> = components.alerts.enabled_channels().collect();

    if channels.is_empty() {
        output.warning("No alert channels are enabled");
        return Ok(());
    }

    output.section("Testing alert channels");
    match components.alerts.test_channels().await {
        Ok(()) => {
            for channel in channels {
                output.success(channel);
            }
            Ok(())
        }
        Err(cause) => {
            for channel in channels {
                match cause.failures.iter().find(|f| f.channel() == channel) {
                    Some(failure) => output.error(&failure.to_string()),
                    None => output.success(channel),
                }
            }
            Err(CoreError::alert_delivery(cause).into())
        }
    }
}
