use serde::{Deserialize, Serialize};

use crate::models::{Monitor, MonitorStatus};

/// The payload handed to every sender when a monitor changes status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub monitor_name: String,
    pub target: String,
    pub status: MonitorStatus,
    pub message: String,
    /// RFC 3339 timestamp of the transition.
    pub time: String,
}

impl NotificationMessage {
    pub fn for_transition(monitor: &Monitor, status: MonitorStatus, message: &str) -> Self {
        Self {
            monitor_name: monitor.name.clone(),
            target: monitor.target.clone(),
            status,
            message: message.to_string(),
            time: chrono::Utc::now().to_rfc3339(),
        }
    }
}
