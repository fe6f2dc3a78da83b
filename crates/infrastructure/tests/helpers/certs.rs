#![allow(dead_code)]
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio_rustls::TlsAcceptor;

/// Self-signed server certificate, with its PEM written to a temp file so
/// clients can trust it through `ca_file`.
pub struct TestCert {
    ca_file: NamedTempFile,
    cert: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
}

impl TestCert {
    pub fn self_signed(names: &[&str]) -> Self {
        let certified = rcgen::generate_simple_self_signed(
            names.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
        )
        .unwrap();

        let mut ca_file = NamedTempFile::new().unwrap();
        ca_file.write_all(certified.cert.pem().as_bytes()).unwrap();

        Self {
            ca_file,
            cert: certified.cert.der().clone(),
            key: PrivateKeyDer::try_from(certified.key_pair.serialize_der()).unwrap(),
        }
    }

    pub fn ca_path(&self) -> String {
        self.ca_file.path().to_string_lossy().into_owned()
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![self.cert.clone()], self.key.clone_key())
            .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }
}
