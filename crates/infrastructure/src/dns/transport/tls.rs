//! TLS connector for DNS-over-TLS (RFC 7858)
//!
//! The TCP leg may be dialled to a bootstrap IP while certificate
//! verification still runs against the endpoint's hostname.

use super::tcp::TcpConnector;
use super::{BoxedStream, Connector};
use async_trait::async_trait;
use dotline_domain::{DomainError, TlsConfig, UpstreamAddr};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Shared TLS config for the common case of public roots and no client
/// certificate. Session tickets are cached inside it, so reconnects to the
/// same upstream resume instead of doing a full handshake.
static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    install_crypto_provider();

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Build the rustls client config for an upstream's TLS settings.
pub fn build_client_config(settings: &TlsConfig) -> Result<Arc<rustls::ClientConfig>, DomainError> {
    if settings.ca_file.is_none() && !settings.has_client_auth() {
        return Ok(Arc::clone(&SHARED_TLS_CONFIG));
    }

    install_crypto_provider();

    let mut root_store = rustls::RootCertStore::empty();
    match &settings.ca_file {
        Some(path) => {
            let certs = load_certs(path)?;
            let (added, _) = root_store.add_parsable_certificates(certs);
            if added == 0 {
                return Err(DomainError::ConfigError(format!(
                    "No usable CA certificates in {}",
                    path
                )));
            }
        }
        None => root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }

    let builder = rustls::ClientConfig::builder().with_root_certificates(root_store);
    let config = match (&settings.client_cert_file, &settings.client_key_file) {
        (Some(cert_path), Some(key_path)) => builder
            .with_client_auth_cert(load_certs(cert_path)?, load_private_key(key_path)?)
            .map_err(|e| {
                DomainError::ConfigError(format!("Invalid client certificate/key: {}", e))
            })?,
        _ => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

fn open_pem(path: &str) -> Result<BufReader<File>, DomainError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| DomainError::ConfigError(format!("Failed to open {}: {}", path, e)))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DomainError::ConfigError(format!("Invalid PEM in {}: {}", path, e)))?;
    if certs.is_empty() {
        return Err(DomainError::ConfigError(format!(
            "No certificates found in {}",
            path
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, DomainError> {
    let mut reader = open_pem(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| DomainError::ConfigError(format!("Invalid PEM in {}: {}", path, e)))?
        .ok_or_else(|| DomainError::ConfigError(format!("No private key found in {}", path)))
}

/// Dials TCP, then runs the TLS handshake against `server_name`.
pub struct TlsConnector {
    tcp: TcpConnector,
    server_name: ServerName<'static>,
    server_name_str: Arc<str>,
    config: Arc<rustls::ClientConfig>,
}

impl TlsConnector {
    pub fn new(
        tcp: TcpConnector,
        server_name: &str,
        config: Arc<rustls::ClientConfig>,
    ) -> Result<Self, DomainError> {
        let parsed = ServerName::try_from(server_name.to_string()).map_err(|e| {
            DomainError::ConfigError(format!("Invalid TLS server name '{}': {}", server_name, e))
        })?;

        Ok(Self {
            tcp,
            server_name: parsed,
            server_name_str: Arc::from(server_name),
            config,
        })
    }

    /// Name the server certificate is verified against.
    pub fn server_name(&self) -> &str {
        &self.server_name_str
    }

    pub fn dial_target(&self) -> &UpstreamAddr {
        self.tcp.target()
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self) -> Result<BoxedStream, DomainError> {
        let tcp_stream = self.tcp.dial().await?;
        let connector = tokio_rustls::TlsConnector::from(Arc::clone(&self.config));

        let handshake_err = |reason: String| DomainError::TransportConnect {
            server: self.tcp.target().to_string(),
            reason,
        };

        let tls_stream = tokio::time::timeout(
            self.tcp.connect_timeout(),
            connector.connect(self.server_name.clone(), tcp_stream),
        )
        .await
        .map_err(|_| handshake_err("TLS handshake timed out".to_string()))?
        .map_err(|e| handshake_err(format!("TLS handshake failed: {}", e)))?;

        debug!(
            server = %self.tcp.target(),
            hostname = %self.server_name_str,
            "TLS connection established"
        );
        Ok(Box::new(tls_stream))
    }

    fn target(&self) -> &UpstreamAddr {
        self.tcp.target()
    }

    fn protocol_name(&self) -> &'static str {
        "TLS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(addr: &str) -> TcpConnector {
        TcpConnector::new(UpstreamAddr::Resolved(addr.parse().unwrap()))
    }

    #[test]
    fn test_shared_tls_config() {
        let config = build_client_config(&TlsConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&config, &SHARED_TLS_CONFIG));
    }

    #[test]
    fn test_server_name_is_kept_apart_from_dial_target() {
        let connector = TlsConnector::new(
            tcp("9.9.9.9:853"),
            "dns.quad9.net",
            build_client_config(&TlsConfig::default()).unwrap(),
        )
        .unwrap();

        assert_eq!(connector.server_name(), "dns.quad9.net");
        assert_eq!(connector.dial_target().to_string(), "9.9.9.9:853");
        assert_eq!(connector.protocol_name(), "TLS");
    }

    #[test]
    fn test_ip_server_name_is_accepted() {
        let connector = TlsConnector::new(
            tcp("1.1.1.1:853"),
            "1.1.1.1",
            build_client_config(&TlsConfig::default()).unwrap(),
        );
        assert!(connector.is_ok());
    }

    #[test]
    fn test_invalid_server_name_is_config_error() {
        let result = TlsConnector::new(
            tcp("1.1.1.1:853"),
            "not a hostname",
            build_client_config(&TlsConfig::default()).unwrap(),
        );
        assert!(matches!(result, Err(DomainError::ConfigError(_))));
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let settings = TlsConfig {
            ca_file: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        };
        assert!(matches!(
            build_client_config(&settings),
            Err(DomainError::ConfigError(_))
        ));
    }
}
