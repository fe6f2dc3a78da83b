use serde::{Deserialize, Serialize};

/// TLS settings of one upstream. Without `ca_file` the bundled web PKI roots are trusted.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM bundle of trust anchors replacing the default roots.
    #[serde(default)]
    pub ca_file: Option<String>,

    /// Name to verify the server certificate against. Ignored when a
    /// bootstrap address is set; the endpoint host is used then.
    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub client_cert_file: Option<String>,

    #[serde(default)]
    pub client_key_file: Option<String>,
}

impl TlsConfig {
    pub fn has_client_auth(&self) -> bool {
        self.client_cert_file.is_some() && self.client_key_file.is_some()
    }
}
