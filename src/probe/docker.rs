use std::time::Instant;

use async_trait::async_trait;
use bollard::container::InspectContainerOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use tokio::time::timeout;

use super::{Probe, ProbeOutcome};
use crate::models::{Monitor, MonitorType};

/// Container-runtime check: inspect the container named in the monitor's
/// `keyword` field and require a running state. The target selects the
/// daemon: empty or "local" for the default socket, otherwise a host URL
/// such as `tcp://192.168.1.100:2375`.
pub struct DockerProbe;

impl DockerProbe {
    pub fn new() -> Self {
        Self
    }

    fn connect(&self, monitor: &Monitor) -> Result<Docker, bollard::errors::Error> {
        let target = monitor.target.trim();
        if target.is_empty() || target == "local" {
            Docker::connect_with_local_defaults()
        } else {
            Docker::connect_with_http(
                target,
                monitor.timeout_seconds.max(1) as u64,
                API_DEFAULT_VERSION,
            )
        }
    }
}

impl Default for DockerProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for DockerProbe {
    fn kind(&self) -> MonitorType {
        MonitorType::Docker
    }

    async fn check(&self, monitor: &Monitor) -> ProbeOutcome {
        let start = Instant::now();

        let container = match monitor.keyword.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return ProbeOutcome::failure(
                    "container name/id required (keyword field)",
                    start.elapsed(),
                )
            }
        };

        let docker = match self.connect(monitor) {
            Ok(docker) => docker,
            Err(e) => {
                return ProbeOutcome::failure(
                    format!("failed to create docker client: {e}"),
                    start.elapsed(),
                )
            }
        };

        let inspect = match timeout(
            monitor.timeout(),
            docker.inspect_container(container, None::<InspectContainerOptions>),
        )
        .await
        {
            Ok(Ok(inspect)) => inspect,
            Ok(Err(e)) => {
                return ProbeOutcome::failure(
                    format!("failed to inspect container: {e}"),
                    start.elapsed(),
                )
            }
            Err(_) => return ProbeOutcome::failure("inspect timed out", start.elapsed()),
        };
        let duration = start.elapsed();

        let state = inspect.state.unwrap_or_default();
        let running = state.running.unwrap_or(false);
        let status = state
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut outcome = if running {
            ProbeOutcome::success(format!("Container is {status}"), duration)
        } else {
            ProbeOutcome::failure(
                format!("Container is not running (status: {status})"),
                duration,
            )
        };
        outcome = outcome.with_field("state", status);
        if let Some(image) = inspect.config.and_then(|c| c.image) {
            outcome = outcome.with_field("image", image);
        }
        outcome
    }
}
