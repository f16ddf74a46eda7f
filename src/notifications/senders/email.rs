use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

use super::{parse_config, NotificationSender, SenderError};
use crate::notifications::models::NotificationMessage;

#[derive(Deserialize)]
struct EmailConfig {
    host: String,
    #[serde(default = "default_smtp_port")]
    port: u16,
    username: String,
    password: String,
    to: Vec<String>,
    from: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Sends a plain-text message over SMTP (STARTTLS).
pub struct EmailSender;

impl EmailSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmailSender {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, SenderError> {
    addr.parse()
        .map_err(|e| SenderError::InvalidConfig(format!("invalid address '{addr}': {e}")))
}

fn format_body(message: &NotificationMessage) -> String {
    format!(
        "Monitor: {}\nTarget: {}\nStatus: {}\nTime: {}\nMessage: {}\n",
        message.monitor_name, message.target, message.status, message.time, message.message,
    )
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn channel_type(&self) -> &'static str {
        "email"
    }

    async fn send(
        &self,
        config_json: &str,
        message: &NotificationMessage,
    ) -> Result<(), SenderError> {
        let config: EmailConfig = parse_config(config_json)?;
        if config.to.is_empty() {
            return Err(SenderError::InvalidConfig(
                "at least one recipient required".to_string(),
            ));
        }

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| SenderError::InvalidConfig(format!("invalid smtp host: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        let subject = format!(
            "[PulseWatch] Monitor {} is {}",
            message.monitor_name,
            message.status.to_string().to_uppercase()
        );

        let mut builder = Message::builder()
            .from(parse_mailbox(&config.from)?)
            .subject(subject);
        for recipient in &config.to {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        let email = builder
            .body(format_body(message))
            .map_err(|e| SenderError::InvalidConfig(e.to_string()))?;

        mailer
            .send(email)
            .await
            .map_err(|e| SenderError::SendFailed(e.to_string()))?;
        Ok(())
    }
}
