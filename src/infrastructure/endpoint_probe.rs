//! Endpoint Probe
//!
//! Performs one bounded connection attempt against an address and port.
//! TLS probes skip certificate verification: targets present self-signed
//! or job-specific certificates, and only reachability plus the SAN list
//! are of interest.

use crate::domain::entities::PortSpec;
use crate::domain::ports::{EndpointProber, ProbeOutcome};
use crate::domain::value_objects::Protocol;
use crate::infrastructure::shutdown::ShutdownController;
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::extensions::GeneralName;

/// Why a probe attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("connection timeout")]
    Timeout,
    #[error("tls handshake failed: {0}")]
    Tls(String),
    #[error("request failed: {0}")]
    Http(String),
    #[error("probe cancelled")]
    Cancelled,
    #[error("probe setup failed: {0}")]
    Setup(String),
}

/// Network prober for monitored ports.
pub struct EndpointProbe {
    timeout: Duration,
    tls: TlsConnector,
    http: reqwest::Client,
    shutdown: ShutdownController,
}

impl EndpointProbe {
    /// Create a prober whose attempts are each bounded by `timeout`.
    pub fn new(timeout: Duration, shutdown: ShutdownController) -> Result<Self, ProbeError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::Setup(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification::new(provider)))
            .with_no_client_auth();

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Setup(e.to_string()))?;

        Ok(Self {
            timeout,
            tls: TlsConnector::from(Arc::new(config)),
            http,
            shutdown,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// TLS handshake; returns the DNS SANs of every peer certificate.
    pub async fn tls_check(&self, addr: SocketAddr) -> Result<Vec<String>, ProbeError> {
        let attempt = async {
            let stream = TcpStream::connect(addr).await?;
            let server_name = ServerName::IpAddress(addr.ip().into());
            let mut tls = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| ProbeError::Tls(e.to_string()))?;

            let names: Vec<String> = tls
                .get_ref()
                .1
                .peer_certificates()
                .map(|certs| certs.iter().flat_map(certificate_dns_names).collect())
                .unwrap_or_default();

            let _ = tls.shutdown().await;
            Ok::<_, ProbeError>(names)
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    /// Plain HTTP GET. Any response, whatever its status, counts as live.
    pub async fn http_check(&self, addr: SocketAddr) -> Result<(), ProbeError> {
        let url = format!("http://{}/", addr);

        match self.http.get(&url).send().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => Err(ProbeError::Timeout),
            Err(e) => Err(ProbeError::Http(e.to_string())),
        }
    }

    async fn attempt(&self, addr: SocketAddr, protocol: Protocol) -> Result<Vec<String>, ProbeError> {
        match protocol {
            Protocol::Https => self.tls_check(addr).await,
            Protocol::Http => self.http_check(addr).await.map(|_| Vec::new()),
        }
    }
}

#[async_trait]
impl EndpointProber for EndpointProbe {
    async fn probe(&self, address: IpAddr, port: &PortSpec) -> ProbeOutcome {
        let protocol = port.effective_protocol();
        let addr = SocketAddr::new(address, port.port);
        let _guard = self.shutdown.probe_guard();

        tracing::debug!("checking {}://{}", protocol, addr);

        let result = tokio::select! {
            result = self.attempt(addr, protocol) => result,
            _ = self.shutdown.cancelled() => Err(ProbeError::Cancelled),
        };

        match result {
            Ok(names) => {
                let domain = port.infer_base_domain(names.iter().map(String::as_str));
                ProbeOutcome::reachable(protocol, domain)
            }
            Err(e) => {
                tracing::debug!("{}://{} not reachable: {}", protocol, addr, e);
                ProbeOutcome::unreachable(protocol)
            }
        }
    }
}

/// DNS subject alternative names of a certificate.
///
/// Other name kinds are ignored. Unparseable certificates yield no names.
pub fn certificate_dns_names(cert: &CertificateDer<'_>) -> Vec<String> {
    let parsed = match x509_parser::parse_x509_certificate(cert.as_ref()) {
        Ok((_, parsed)) => parsed,
        Err(e) => {
            tracing::debug!("unable to parse peer certificate: {}", e);
            return Vec::new();
        }
    };

    match parsed.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::debug!("unable to read certificate SANs: {}", e);
            Vec::new()
        }
    }
}

/// Accepts any server certificate; signatures are still checked so the
/// handshake itself stays well-formed.
#[derive(Debug)]
struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl SkipServerVerification {
    fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
impl ServerCertVerifier for SkipServerVerification {
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
