use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use thiserror::Error;

use super::models::NotificationMessage;

pub mod discord;
pub mod email;
pub mod telegram;
pub mod webhook;

/// Shared outbound client for the HTTP-based senders.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("default client configuration is valid")
});

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A channel-type-specific delivery implementation. Each sender parses its
/// own opaque config blob; a malformed blob fails only that send.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Tag matched against `NotificationChannel::channel_type`.
    fn channel_type(&self) -> &'static str;

    async fn send(&self, config_json: &str, message: &NotificationMessage)
        -> Result<(), SenderError>;
}

pub(crate) fn parse_config<T: serde::de::DeserializeOwned>(
    config_json: &str,
) -> Result<T, SenderError> {
    serde_json::from_str(config_json).map_err(|e| SenderError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::mpsc;

    /// Sender that records every delivery on a channel; a config blob of
    /// `"fail"` simulates a malformed configuration.
    pub struct RecordingSender {
        tx: mpsc::UnboundedSender<NotificationMessage>,
    }

    impl RecordingSender {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationMessage>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        fn channel_type(&self) -> &'static str {
            "recording"
        }

        async fn send(
            &self,
            config_json: &str,
            message: &NotificationMessage,
        ) -> Result<(), SenderError> {
            if config_json == "fail" {
                return Err(SenderError::InvalidConfig("simulated".to_string()));
            }
            self.tx
                .send(message.clone())
                .map_err(|e| SenderError::SendFailed(e.to_string()))
        }
    }
}
