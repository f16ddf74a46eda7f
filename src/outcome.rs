//! Shared tail of every check: persist the result, detect a transition,
//! fan out notifications, update the monitor row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::models::{CheckResult, Monitor, MonitorStatus};
use crate::notifications::NotificationDispatcher;
use crate::probe::ProbeOutcome;
use crate::repository::{MonitorRepository, ResultRepository};

/// One fully-derived check outcome, ready to be recorded. Produced by an
/// active probe, an external heartbeat, or the overdue detector.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub status: MonitorStatus,
    pub response_time_ms: i64,
    pub message: String,
    pub certificate_expiry: Option<DateTime<Utc>>,
    /// Overdue detection keeps the original last-seen time for diagnostics.
    pub advance_checked_at: bool,
}

impl CheckOutcome {
    pub fn from_probe(outcome: &ProbeOutcome) -> Self {
        Self {
            status: if outcome.success {
                MonitorStatus::Up
            } else {
                MonitorStatus::Down
            },
            response_time_ms: outcome.response_time.as_millis() as i64,
            message: outcome.message.clone(),
            certificate_expiry: outcome.cert_expiry,
            advance_checked_at: true,
        }
    }
}

/// Applies a [`CheckOutcome`] to the store. The transition comparison uses
/// the monitor snapshot the caller loaded at tick start, never a re-read.
/// Persistence failures are logged and never abort the remaining steps.
pub struct OutcomeRecorder {
    monitors: Arc<dyn MonitorRepository>,
    results: Arc<dyn ResultRepository>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl OutcomeRecorder {
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        results: Arc<dyn ResultRepository>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            monitors,
            results,
            dispatcher,
        }
    }

    pub async fn record(&self, monitor: &Monitor, outcome: CheckOutcome) {
        let now = Utc::now();

        let result = CheckResult {
            monitor_id: monitor.id,
            status: outcome.status,
            response_time_ms: outcome.response_time_ms,
            message: outcome.message.clone(),
            created_at: now,
        };
        if let Err(e) = self.results.create(&result).await {
            error!(monitor_id = monitor.id, error = %e, "failed to save check result");
        }

        if monitor.last_status != outcome.status {
            info!(
                monitor = %monitor.name,
                old_status = %monitor.last_status,
                new_status = %outcome.status,
                "monitor status changed"
            );
            self.dispatcher
                .notify(monitor, outcome.status, &outcome.message)
                .await;
        }

        let mut updated = monitor.clone();
        updated.last_status = outcome.status;
        if outcome.advance_checked_at {
            updated.last_checked_at = Some(now);
        }
        if let Some(expiry) = outcome.certificate_expiry {
            updated.certificate_expiry = Some(expiry);
        }
        updated.updated_at = now;
        if let Err(e) = self.monitors.update(&updated).await {
            error!(monitor_id = monitor.id, error = %e, "failed to update monitor status");
        }
    }
}
