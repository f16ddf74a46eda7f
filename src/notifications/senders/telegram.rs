use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{parse_config, NotificationSender, SenderError, HTTP_CLIENT};
use crate::models::MonitorStatus;
use crate::notifications::models::NotificationMessage;

#[derive(Deserialize)]
struct TelegramConfig {
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct TelegramPayload<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'a str,
}

/// Sends a formatted message through the Telegram Bot API.
pub struct TelegramSender;

impl TelegramSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TelegramSender {
    fn default() -> Self {
        Self::new()
    }
}

fn status_icon(status: MonitorStatus) -> &'static str {
    match status {
        MonitorStatus::Up => "\u{2705}",
        MonitorStatus::Down => "\u{1F534}",
        MonitorStatus::Unknown => "\u{2753}",
    }
}

fn format_text(message: &NotificationMessage) -> String {
    format!(
        "{} *Monitor Status Update*\n\n\
         *Monitor:* {}\n\
         *Status:* {}\n\
         *Target:* {}\n\
         *Message:* {}\n\
         *Time:* {}",
        status_icon(message.status),
        message.monitor_name,
        message.status,
        message.target,
        message.message,
        message.time,
    )
}

#[async_trait]
impl NotificationSender for TelegramSender {
    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    async fn send(
        &self,
        config_json: &str,
        message: &NotificationMessage,
    ) -> Result<(), SenderError> {
        let config: TelegramConfig = parse_config(config_json)?;

        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            config.bot_token
        );
        let payload = TelegramPayload {
            chat_id: &config.chat_id,
            text: format_text(message),
            parse_mode: "Markdown",
        };

        let response = HTTP_CLIENT.post(&url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "telegram api returned status {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_includes_icon_and_fields() {
        let message = NotificationMessage {
            monitor_name: "api".into(),
            target: "https://api.example".into(),
            status: MonitorStatus::Up,
            message: "HTTP 200 OK".into(),
            time: "2026-01-01T00:00:00Z".into(),
        };
        let text = format_text(&message);
        assert!(text.starts_with("\u{2705}"));
        assert!(text.contains("*Monitor:* api"));
        assert!(text.contains("*Status:* up"));
    }

    #[tokio::test]
    async fn malformed_config_is_rejected() {
        let message = NotificationMessage {
            monitor_name: "api".into(),
            target: "t".into(),
            status: MonitorStatus::Down,
            message: "m".into(),
            time: "now".into(),
        };
        let err = TelegramSender::new()
            .send("not json", &message)
            .await
            .unwrap_err();
        assert!(matches!(err, SenderError::InvalidConfig(_)));
    }
}
