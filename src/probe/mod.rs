//! Protocol-specific health-check executors.
//!
//! Every probe is stateless, single-shot, and bounded by the monitor's
//! configured timeout. A probe never returns an error: any network,
//! timeout, or protocol failure becomes a failed [`ProbeOutcome`] with a
//! human-readable message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Monitor, MonitorType};

pub mod dns;
pub mod docker;
pub mod http;
pub mod ping;
pub mod steam;
pub mod tcp;
pub(crate) mod tls;
pub mod ws;

/// Outcome of one probe invocation.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub success: bool,
    pub response_time: Duration,
    pub message: String,
    /// Leaf-certificate expiry, populated by TLS-capable probes.
    pub cert_expiry: Option<DateTime<Utc>>,
    /// Protocol-specific extras (status code, map name, player counts, ...).
    pub fields: HashMap<String, serde_json::Value>,
}

impl ProbeOutcome {
    pub fn success(message: impl Into<String>, response_time: Duration) -> Self {
        Self {
            success: true,
            message: message.into(),
            response_time,
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>, response_time: Duration) -> Self {
        Self {
            success: false,
            message: message.into(),
            response_time,
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> MonitorType;
    async fn check(&self, monitor: &Monitor) -> ProbeOutcome;
}

/// Dispatch table from monitor type to its check implementation. Adding a
/// protocol means adding a variant and a registry entry, not touching
/// callers.
pub struct ProbeRegistry {
    probes: HashMap<MonitorType, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    pub fn empty() -> Self {
        Self {
            probes: HashMap::new(),
        }
    }

    /// Registry with all built-in probes. The HTTP probe serves the plain,
    /// keyword, and JSON-query variants.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        let http = Arc::new(http::HttpProbe::new());
        registry.register(MonitorType::Http, http.clone());
        registry.register(MonitorType::HttpKeyword, http.clone());
        registry.register(MonitorType::HttpJson, http);
        registry.register(MonitorType::Tcp, Arc::new(tcp::TcpProbe::new()));
        registry.register(MonitorType::Ping, Arc::new(ping::PingProbe::new()));
        registry.register(MonitorType::Dns, Arc::new(dns::DnsProbe::new()));
        registry.register(MonitorType::Websocket, Arc::new(ws::WebsocketProbe::new()));
        registry.register(MonitorType::Steam, Arc::new(steam::SteamProbe::new()));
        registry.register(MonitorType::Docker, Arc::new(docker::DockerProbe::new()));
        registry
    }

    pub fn register(&mut self, kind: MonitorType, probe: Arc<dyn Probe>) {
        self.probes.insert(kind, probe);
    }

    pub fn get(&self, kind: MonitorType) -> Option<Arc<dyn Probe>> {
        self.probes.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_all_active_types() {
        let registry = ProbeRegistry::builtin();
        for kind in [
            MonitorType::Http,
            MonitorType::HttpKeyword,
            MonitorType::HttpJson,
            MonitorType::Tcp,
            MonitorType::Ping,
            MonitorType::Dns,
            MonitorType::Websocket,
            MonitorType::Steam,
            MonitorType::Docker,
        ] {
            assert!(registry.get(kind).is_some(), "missing probe for {kind}");
        }
        // Push monitors are passive; they have no probe.
        assert!(registry.get(MonitorType::Push).is_none());
    }
}
