use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_config, NotificationSender, SenderError, HTTP_CLIENT};
use crate::notifications::models::NotificationMessage;

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
}

/// POSTs the notification message as JSON to a configured URL.
pub struct WebhookSender;

impl WebhookSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn channel_type(&self) -> &'static str {
        "webhook"
    }

    async fn send(
        &self,
        config_json: &str,
        message: &NotificationMessage,
    ) -> Result<(), SenderError> {
        let config: WebhookConfig = parse_config(config_json)?;

        let response = HTTP_CLIENT.post(&config.url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "webhook returned status {status}"
            )));
        }
        Ok(())
    }
}
