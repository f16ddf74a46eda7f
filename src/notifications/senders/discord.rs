use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{parse_config, NotificationSender, SenderError, HTTP_CLIENT};
use crate::models::MonitorStatus;
use crate::notifications::models::NotificationMessage;

const COLOR_GREEN: u32 = 0x2ECC71;
const COLOR_RED: u32 = 0xE74C3C;
const COLOR_GRAY: u32 = 0x95A5A6;

#[derive(Deserialize)]
struct DiscordConfig {
    webhook_url: String,
}

#[derive(Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<EmbedField>,
    timestamp: String,
}

#[derive(Serialize)]
struct DiscordPayload {
    embeds: Vec<Embed>,
}

/// Posts a colored embed (green up, red down) to a Discord webhook.
pub struct DiscordSender;

impl DiscordSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DiscordSender {
    fn default() -> Self {
        Self::new()
    }
}

fn status_color(status: MonitorStatus) -> u32 {
    match status {
        MonitorStatus::Up => COLOR_GREEN,
        MonitorStatus::Down => COLOR_RED,
        MonitorStatus::Unknown => COLOR_GRAY,
    }
}

#[async_trait]
impl NotificationSender for DiscordSender {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    async fn send(
        &self,
        config_json: &str,
        message: &NotificationMessage,
    ) -> Result<(), SenderError> {
        let config: DiscordConfig = parse_config(config_json)?;

        let payload = DiscordPayload {
            embeds: vec![Embed {
                title: format!("Monitor Status: {}", message.status),
                description: format!("**{}** is {}", message.monitor_name, message.status),
                color: status_color(message.status),
                fields: vec![
                    EmbedField {
                        name: "Target".into(),
                        value: message.target.clone(),
                        inline: true,
                    },
                    EmbedField {
                        name: "Message".into(),
                        value: message.message.clone(),
                        inline: true,
                    },
                    EmbedField {
                        name: "Time".into(),
                        value: message.time.clone(),
                        inline: false,
                    },
                ],
                timestamp: message.time.clone(),
            }],
        };

        let response = HTTP_CLIENT
            .post(&config.webhook_url)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "discord webhook returned status {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn colors_map_to_status() {
        assert_eq!(status_color(MonitorStatus::Up), COLOR_GREEN);
        assert_eq!(status_color(MonitorStatus::Down), COLOR_RED);
        assert_eq!(status_color(MonitorStatus::Unknown), COLOR_GRAY);
    }

    #[tokio::test]
    async fn posts_embed_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/webhook")
                    .body_contains("\"color\":15158332")
                    .body_contains("**db** is down");
                then.status(204);
            })
            .await;

        let config = format!(r#"{{"webhook_url":"{}"}}"#, server.url("/webhook"));
        let message = NotificationMessage {
            monitor_name: "db".into(),
            target: "tcp://db:5432".into(),
            status: MonitorStatus::Down,
            message: "connection failed".into(),
            time: "2026-01-01T00:00:00Z".into(),
        };
        DiscordSender::new().send(&config, &message).await.unwrap();
        mock.assert_async().await;
    }
}
