use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Method, Url};
use tracing::{debug, warn};

use super::{tls, Probe, ProbeOutcome};
use crate::models::{Monitor, MonitorType};

const PROBE_USER_AGENT: &str = "PulseWatch/1.0";
const DEFAULT_EXPECTED_STATUS: &str = "200";

/// HTTP health check: one request, a status match, then an optional keyword
/// or JSON-path secondary check once the status check passed.
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn kind(&self) -> MonitorType {
        MonitorType::Http
    }

    async fn check(&self, monitor: &Monitor) -> ProbeOutcome {
        let start = Instant::now();

        // Per-check client: the timeout is per monitor, and verification is
        // skipped so self-signed targets can be monitored.
        let client = match reqwest::Client::builder()
            .timeout(monitor.timeout())
            .danger_accept_invalid_certs(true)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                return ProbeOutcome::failure(format!("failed to build client: {e}"), start.elapsed())
            }
        };

        let method = monitor
            .method
            .as_deref()
            .filter(|m| !m.is_empty())
            .and_then(|m| Method::from_bytes(m.to_uppercase().as_bytes()).ok())
            .unwrap_or(Method::GET);

        let mut request = client
            .request(method, &monitor.target)
            .header(USER_AGENT, PROBE_USER_AGENT);

        if let Some(body) = monitor.body.as_ref().filter(|b| !b.is_empty()) {
            request = request.body(body.clone());
        }

        if let Some(headers) = monitor.headers.as_deref().filter(|h| !h.is_empty()) {
            match serde_json::from_str::<std::collections::HashMap<String, String>>(headers) {
                Ok(map) => {
                    for (key, value) in map {
                        match (
                            HeaderName::from_bytes(key.as_bytes()),
                            HeaderValue::from_str(&value),
                        ) {
                            (Ok(name), Ok(value)) => request = request.header(name, value),
                            _ => warn!(monitor_id = monitor.id, header = %key, "skipping invalid header"),
                        }
                    }
                }
                Err(e) => warn!(monitor_id = monitor.id, error = %e, "ignoring malformed headers config"),
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return ProbeOutcome::failure(format!("request failed: {e}"), start.elapsed())
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return ProbeOutcome::failure(format!("failed to read body: {e}"), start.elapsed())
            }
        };
        let duration = start.elapsed();

        let expected = monitor
            .expected_status
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_EXPECTED_STATUS);

        let mut success = if expected == "2xx" {
            status.is_success()
        } else {
            status.as_u16().to_string() == expected
        };

        let mut message = if success {
            format!("HTTP {status}")
        } else {
            format!("Unexpected status: {} (expected {expected})", status.as_u16())
        };

        // Secondary checks apply only when the status check passed.
        if success {
            if monitor.monitor_type == MonitorType::HttpKeyword {
                if let Some(keyword) = monitor.keyword.as_deref().filter(|k| !k.is_empty()) {
                    if !body.contains(keyword) {
                        success = false;
                        message = format!("Keyword '{keyword}' not found");
                    }
                }
            }

            if monitor.monitor_type == MonitorType::HttpJson {
                if let Some(path) = monitor.json_path.as_deref().filter(|p| !p.is_empty()) {
                    match serde_json::from_str::<serde_json::Value>(&body) {
                        Ok(root) => match json_lookup(&root, path) {
                            Some(found) => {
                                let found = json_as_string(found);
                                if let Some(want) =
                                    monitor.json_value.as_deref().filter(|v| !v.is_empty())
                                {
                                    if found != want {
                                        success = false;
                                        message = format!(
                                            "JSON value mismatch: expected '{want}', got '{found}'"
                                        );
                                    }
                                }
                            }
                            None => {
                                success = false;
                                message = format!("JSON path '{path}' not found");
                            }
                        },
                        Err(_) => {
                            success = false;
                            message = "response body is not valid JSON".to_string();
                        }
                    }
                }
            }
        }

        let mut outcome = ProbeOutcome {
            success,
            response_time: duration,
            message,
            ..ProbeOutcome::default()
        }
        .with_field("status_code", status.as_u16());

        // reqwest does not expose the peer certificate, so https targets get
        // a second, verification-free handshake to read the expiry. Failure
        // here never fails the check.
        if let Ok(url) = Url::parse(&monitor.target) {
            if url.scheme() == "https" {
                if let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) {
                    match tls::peer_certificate_expiry(host, port, monitor.timeout()).await {
                        Ok(expiry) => outcome.cert_expiry = Some(expiry),
                        Err(e) => {
                            debug!(monitor_id = monitor.id, error = %e, "certificate expiry lookup failed")
                        }
                    }
                }
            }
        }

        outcome
    }
}

/// Walks a dot-separated path over a JSON document. Numeric segments index
/// into arrays.
fn json_lookup<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn json_as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
