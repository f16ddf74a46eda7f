use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};

use super::{tls, Probe, ProbeOutcome};
use crate::models::{Monitor, MonitorType};

/// WebSocket check: success iff the opening handshake completes. The
/// handshake's HTTP status is captured as metadata.
pub struct WebsocketProbe;

impl WebsocketProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebsocketProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for WebsocketProbe {
    fn kind(&self) -> MonitorType {
        MonitorType::Websocket
    }

    async fn check(&self, monitor: &Monitor) -> ProbeOutcome {
        let start = Instant::now();

        let mut request = match monitor.target.clone().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                return ProbeOutcome::failure(format!("invalid URL: {e}"), start.elapsed())
            }
        };
        request
            .headers_mut()
            .insert(USER_AGENT, "PulseWatch/1.0".parse().expect("static header"));

        let connector = Connector::Rustls(Arc::new(tls::insecure_client_config()));
        let handshake =
            connect_async_tls_with_config(request, None, false, Some(connector));

        match timeout(monitor.timeout(), handshake).await {
            Ok(Ok((_stream, response))) => {
                let code = response.status().as_u16();
                ProbeOutcome::success(format!("Connected (HTTP {code})"), start.elapsed())
                    .with_field("status_code", code)
            }
            Ok(Err(WsError::Http(response))) => {
                let code = response.status().as_u16();
                ProbeOutcome::failure(
                    format!("handshake rejected (HTTP {code})"),
                    start.elapsed(),
                )
                .with_field("status_code", code)
            }
            Ok(Err(e)) => {
                ProbeOutcome::failure(format!("connection failed: {e}"), start.elapsed())
            }
            Err(_) => ProbeOutcome::failure("handshake timed out", start.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::monitor;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn handshake_against_local_server_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        });

        let m = monitor(MonitorType::Websocket, &format!("ws://{addr}"));
        let outcome = WebsocketProbe::new().check(&m).await;
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.fields["status_code"], serde_json::json!(101));
    }

    #[tokio::test]
    async fn refused_connection_fails() {
        let m = monitor(MonitorType::Websocket, "ws://127.0.0.1:1");
        let outcome = WebsocketProbe::new().check(&m).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn invalid_url_fails() {
        let m = monitor(MonitorType::Websocket, "not a url");
        let outcome = WebsocketProbe::new().check(&m).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("invalid URL"));
    }
}
