//! TLS plumbing shared by the HTTP and WebSocket probes.
//!
//! Monitored targets frequently run self-signed certificates, so probe
//! connections skip verification. The same handshake path doubles as the
//! peer-certificate expiry reader for https monitors.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::parse_x509_certificate;

#[derive(Error, Debug)]
pub enum CertFetchError {
    #[error("invalid server name: {0}")]
    InvalidName(String),
    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("handshake timed out")]
    Timeout,
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("server presented no certificate")]
    NoCertificate,
    #[error("certificate parse failed: {0}")]
    Parse(String),
}

#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Client config that accepts any server certificate.
pub fn insecure_client_config() -> ClientConfig {
    let mut config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .expect("ring provider supports default protocol versions")
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    config
}

/// Reads the `notAfter` of the leaf certificate presented by `host:port`.
pub async fn peer_certificate_expiry(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<DateTime<Utc>, CertFetchError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| CertFetchError::InvalidName(host.to_string()))?;
    let connector = TlsConnector::from(Arc::new(insecure_client_config()));

    let handshake = async {
        let stream = TcpStream::connect((host, port)).await?;
        let tls = connector.connect(server_name, stream).await?;
        let (_, session) = tls.get_ref();
        let der = session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or(CertFetchError::NoCertificate)?
            .to_vec();
        Ok::<_, CertFetchError>(der)
    };

    let der = tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| CertFetchError::Timeout)??;

    let (_, cert) =
        parse_x509_certificate(&der).map_err(|e| CertFetchError::Parse(e.to_string()))?;
    let not_after = cert.validity().not_after.timestamp();
    Utc.timestamp_opt(not_after, 0)
        .single()
        .ok_or_else(|| CertFetchError::Parse("notAfter out of range".to_string()))
}
