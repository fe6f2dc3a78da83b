use super::tls::TlsConfig;
use crate::dns_protocol::{DnsProtocol, Endpoint};
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;

/// One upstream resolver reached over a persistent stream connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub id: String,

    #[serde(default)]
    pub protocol: DnsProtocol,

    pub endpoint: String,

    /// IP to dial instead of looking up the endpoint's hostname.
    #[serde(default)]
    pub bootstrap_address: Option<IpAddr>,

    /// Local IP outbound connections are bound to.
    #[serde(default)]
    pub local_address: Option<IpAddr>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default)]
    pub tls: TlsConfig,
}

impl UpstreamConfig {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol: DnsProtocol::default(),
            endpoint: endpoint.into(),
            bootstrap_address: None,
            local_address: None,
            timeout_ms: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            tls: TlsConfig::default(),
        }
    }

    pub fn parsed_endpoint(&self) -> Result<Endpoint, DomainError> {
        Endpoint::parse(&self.endpoint, self.protocol.default_port())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_QUERY_TIMEOUT_MS))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}
