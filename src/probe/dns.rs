use std::time::Instant;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tokio::time::timeout;

use super::{Probe, ProbeOutcome};
use crate::models::{Monitor, MonitorType};

/// DNS resolution check: success iff the system resolver returns at least
/// one address for the target hostname.
pub struct DnsProbe;

impl DnsProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for DnsProbe {
    fn kind(&self) -> MonitorType {
        MonitorType::Dns
    }

    async fn check(&self, monitor: &Monitor) -> ProbeOutcome {
        let start = Instant::now();
        let query = format!("{}:0", monitor.target);

        let addrs = match timeout(monitor.timeout(), lookup_host(query)).await {
            Ok(Ok(addrs)) => addrs.map(|a| a.ip()).collect::<Vec<_>>(),
            Ok(Err(e)) => {
                return ProbeOutcome::failure(format!("lookup failed: {e}"), start.elapsed())
            }
            Err(_) => return ProbeOutcome::failure("lookup timed out", start.elapsed()),
        };
        let duration = start.elapsed();

        if addrs.is_empty() {
            return ProbeOutcome::failure("no IP addresses found", duration);
        }

        ProbeOutcome::success(format!("Resolved {} addresses", addrs.len()), duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::monitor;

    #[tokio::test]
    async fn localhost_resolves() {
        let m = monitor(MonitorType::Dns, "localhost");
        let outcome = DnsProbe::new().check(&m).await;
        assert!(outcome.success, "{}", outcome.message);
    }

    #[tokio::test]
    async fn unresolvable_name_fails() {
        let m = monitor(MonitorType::Dns, "does-not-exist.invalid");
        let outcome = DnsProbe::new().check(&m).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("lookup failed"));
    }
}
