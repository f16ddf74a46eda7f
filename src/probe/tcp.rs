use std::time::Instant;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{Probe, ProbeOutcome};
use crate::models::{Monitor, MonitorType};

/// TCP connect check: success iff a connection completes within the
/// timeout. No payload is exchanged.
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn kind(&self) -> MonitorType {
        MonitorType::Tcp
    }

    async fn check(&self, monitor: &Monitor) -> ProbeOutcome {
        let start = Instant::now();

        match timeout(monitor.timeout(), TcpStream::connect(&monitor.target)).await {
            Ok(Ok(_stream)) => {
                ProbeOutcome::success("Connection established", start.elapsed())
            }
            Ok(Err(e)) => {
                ProbeOutcome::failure(format!("connection failed: {e}"), start.elapsed())
            }
            Err(_) => ProbeOutcome::failure("connection timed out", start.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::monitor;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_port_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let m = monitor(MonitorType::Tcp, &addr.to_string());
        let outcome = TcpProbe::new().check(&m).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Connection established");
    }

    #[tokio::test]
    async fn refused_connection_fails() {
        let m = monitor(MonitorType::Tcp, "127.0.0.1:1");
        let outcome = TcpProbe::new().check(&m).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("connection failed"));
    }
}
