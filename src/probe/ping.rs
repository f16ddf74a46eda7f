use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use rand::random;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use tokio::net::lookup_host;
use tracing::{debug, warn};

use super::{Probe, ProbeOutcome};
use crate::models::{Monitor, MonitorType};

const ECHO_COUNT: u16 = 3;

/// ICMP echo check: a fixed count of probes, failing only on 100% loss.
/// Partial loss is logged but still counts as up.
pub struct PingProbe;

impl PingProbe {
    pub fn new() -> Self {
        Self
    }

    async fn resolve(&self, target: &str) -> Option<IpAddr> {
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Some(ip);
        }
        lookup_host(format!("{target}:0"))
            .await
            .ok()?
            .next()
            .map(|addr| addr.ip())
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for PingProbe {
    fn kind(&self) -> MonitorType {
        MonitorType::Ping
    }

    async fn check(&self, monitor: &Monitor) -> ProbeOutcome {
        let addr = match self.resolve(&monitor.target).await {
            Some(addr) => addr,
            None => {
                return ProbeOutcome::failure(
                    format!("failed to resolve host: {}", monitor.target),
                    Duration::ZERO,
                )
            }
        };

        let config = match addr {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };

        // Raw sockets need elevated privileges; surface the cause instead
        // of erroring.
        let client = match Client::new(&config) {
            Ok(client) => client,
            Err(e) => {
                return ProbeOutcome::failure(
                    format!("failed to init pinger: {e}"),
                    Duration::ZERO,
                )
            }
        };

        let mut pinger = client.pinger(addr, PingIdentifier(random())).await;
        pinger.timeout(monitor.timeout());

        // The per-echo timeout above bounds one echo; the whole run gets
        // the same budget so three lost echoes cannot stack to 3x.
        let mut rtts = Vec::with_capacity(ECHO_COUNT as usize);
        let echo_run = async {
            for seq in 0..ECHO_COUNT {
                match pinger.ping(PingSequence(seq), &[]).await {
                    Ok((_packet, rtt)) => rtts.push(rtt),
                    Err(e) => debug!(monitor_id = monitor.id, seq, error = %e, "echo lost"),
                }
            }
        };
        if tokio::time::timeout(monitor.timeout(), echo_run).await.is_err() {
            debug!(monitor_id = monitor.id, "echo run hit the monitor timeout");
        }

        let loss = 100.0 * (ECHO_COUNT as usize - rtts.len()) as f64 / ECHO_COUNT as f64;
        if rtts.is_empty() {
            return ProbeOutcome::failure("100% packet loss", Duration::ZERO);
        }
        if loss > 0.0 {
            warn!(monitor_id = monitor.id, loss, "partial packet loss");
        }

        let avg = rtts.iter().sum::<Duration>() / rtts.len() as u32;
        ProbeOutcome::success(
            format!("Avg RTT: {}ms, Loss: {loss:.2}%", avg.as_millis()),
            avg,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::monitor;

    #[tokio::test]
    async fn unresolvable_target_fails_cleanly() {
        let m = monitor(MonitorType::Ping, "does-not-exist.invalid");
        let outcome = PingProbe::new().check(&m).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("failed to resolve host"));
    }

    #[tokio::test]
    async fn check_is_bounded_by_the_monitor_timeout() {
        // TEST-NET-1 address, guaranteed to drop every echo. Whether the
        // pinger can even be created (raw sockets need privileges), the
        // check must come back within one timeout budget, not one per echo.
        let mut m = monitor(MonitorType::Ping, "203.0.113.1");
        m.timeout_seconds = 1;

        let started = std::time::Instant::now();
        let outcome = PingProbe::new().check(&m).await;
        assert!(!outcome.success);
        assert!(
            started.elapsed() < Duration::from_millis(2500),
            "check took {:?}",
            started.elapsed()
        );
    }
}
