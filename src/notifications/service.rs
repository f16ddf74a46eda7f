use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::models::NotificationMessage;
use super::senders::{
    discord::DiscordSender, email::EmailSender, telegram::TelegramSender,
    webhook::WebhookSender, NotificationSender,
};
use crate::models::{Monitor, MonitorStatus};
use crate::repository::SubscriptionRepository;

/// Fans a status-change message out to every enabled channel subscribed to
/// a monitor. Sends are independent tasks: one channel's failure or
/// slowness never blocks or fails another's, and nothing is retried.
pub struct NotificationDispatcher {
    subscriptions: Arc<dyn SubscriptionRepository>,
    senders: HashMap<&'static str, Arc<dyn NotificationSender>>,
}

impl NotificationDispatcher {
    /// Dispatcher with the built-in senders registered.
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        let mut dispatcher = Self {
            subscriptions,
            senders: HashMap::new(),
        };
        dispatcher.register_sender(Arc::new(WebhookSender::new()));
        dispatcher.register_sender(Arc::new(EmailSender::new()));
        dispatcher.register_sender(Arc::new(DiscordSender::new()));
        dispatcher.register_sender(Arc::new(TelegramSender::new()));
        dispatcher
    }

    pub fn register_sender(&mut self, sender: Arc<dyn NotificationSender>) {
        self.senders.insert(sender.channel_type(), sender);
    }

    /// Resolves subscriptions and scatters the sends. Returns once every
    /// send has been scheduled; delivery itself is collected and logged in
    /// the background.
    pub async fn notify(&self, monitor: &Monitor, new_status: MonitorStatus, message: &str) {
        let channels = match self.subscriptions.channels_for_monitor(monitor.id).await {
            Ok(channels) => channels,
            Err(e) => {
                error!(monitor_id = monitor.id, error = %e, "failed to resolve subscriptions");
                return;
            }
        };
        if channels.is_empty() {
            return;
        }

        let payload = NotificationMessage::for_transition(monitor, new_status, message);

        let mut sends: JoinSet<(String, Result<(), super::senders::SenderError>)> =
            JoinSet::new();
        for channel in channels {
            if !channel.enabled {
                continue;
            }
            let Some(sender) = self.senders.get(channel.channel_type.as_str()).cloned() else {
                warn!(channel = %channel.name, channel_type = %channel.channel_type, "unknown notifier type");
                continue;
            };
            let payload = payload.clone();
            sends.spawn(async move {
                let result = sender.send(&channel.config, &payload).await;
                (channel.name, result)
            });
        }

        // Collect per-send results off the caller's path.
        tokio::spawn(async move {
            while let Some(joined) = sends.join_next().await {
                match joined {
                    Ok((channel, Ok(()))) => info!(%channel, "notification sent"),
                    Ok((channel, Err(e))) => {
                        error!(%channel, error = %e, "failed to send notification")
                    }
                    Err(e) => error!(error = %e, "notification task failed"),
                }
            }
        });
    }
}
