//! Push monitors are the inverse of the active probes: the monitored
//! system reports in, and silence past the grace window means down.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::models::{Monitor, MonitorStatus, MonitorType};
use crate::outcome::{CheckOutcome, OutcomeRecorder};
use crate::repository::{MonitorRepository, RepositoryError};

/// Slack added on top of the monitor interval before a silent push
/// monitor is declared overdue.
const GRACE_SECONDS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("no push monitor matches the supplied token")]
    UnknownToken,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct HeartbeatService {
    monitors: Arc<dyn MonitorRepository>,
    recorder: Arc<OutcomeRecorder>,
}

impl HeartbeatService {
    pub fn new(monitors: Arc<dyn MonitorRepository>, recorder: Arc<OutcomeRecorder>) -> Self {
        Self { monitors, recorder }
    }

    /// Records an incoming heartbeat. An absent or empty `status` and the
    /// literal `"up"` all count as up; anything else counts as down.
    pub async fn process_heartbeat(
        &self,
        token: &str,
        status: Option<&str>,
        message: Option<&str>,
        ping_ms: Option<i64>,
    ) -> Result<(), HeartbeatError> {
        let monitor = self
            .monitors
            .get_by_push_token(token)
            .await?
            .ok_or(HeartbeatError::UnknownToken)?;

        let status = match status {
            None | Some("") | Some("up") => MonitorStatus::Up,
            Some(_) => MonitorStatus::Down,
        };
        let message = message.filter(|m| !m.is_empty()).unwrap_or("Heartbeat received");

        info!(monitor = %monitor.name, status = %status, "heartbeat received");
        self.recorder
            .record(
                &monitor,
                CheckOutcome {
                    status,
                    response_time_ms: ping_ms.unwrap_or(0),
                    message: message.to_string(),
                    certificate_expiry: None,
                    advance_checked_at: true,
                },
            )
            .await;
        Ok(())
    }

    /// Called every scheduler tick for each push monitor. A monitor that
    /// has never reported in is exempt. The forced-down outcome keeps
    /// `last_checked_at` at the last real heartbeat.
    pub async fn check_overdue(&self, monitor: &Monitor) {
        debug_assert_eq!(monitor.monitor_type, MonitorType::Push);

        let Some(last_seen) = monitor.last_checked_at else {
            return;
        };
        let deadline = monitor.interval_seconds as i64 + GRACE_SECONDS;
        let silent_for = (Utc::now() - last_seen).num_seconds();
        if silent_for <= deadline || monitor.last_status == MonitorStatus::Down {
            return;
        }

        info!(
            monitor = %monitor.name,
            silent_for,
            "push monitor missed its heartbeat window"
        );
        self.recorder
            .record(
                monitor,
                CheckOutcome {
                    status: MonitorStatus::Down,
                    response_time_ms: 0,
                    message: "Heartbeat overdue".to_string(),
                    certificate_expiry: None,
                    advance_checked_at: false,
                },
            )
            .await;
    }
}
