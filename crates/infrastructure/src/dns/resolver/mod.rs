#[cfg(feature = "dns-over-rustls")]
pub mod dot;
pub mod tcp;

#[cfg(feature = "dns-over-rustls")]
pub use dot::{DotClient, DotClientOptions};
pub use tcp::{TcpClient, TcpClientOptions};

use crate::dns::pipeline::PipelineStats;
use async_trait::async_trait;
use dotline_application::ports::DnsResolver;
use dotline_domain::{ClientInfo, DnsProtocol, DomainError, UpstreamConfig};
use hickory_proto::op::Message;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Query timeout used when none is configured.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Client for one upstream, whichever protocol it speaks.
pub enum UpstreamClient {
    #[cfg(feature = "dns-over-rustls")]
    Dot(DotClient),
    Tcp(TcpClient),
}

impl UpstreamClient {
    pub fn stats(&self) -> PipelineStats {
        match self {
            #[cfg(feature = "dns-over-rustls")]
            Self::Dot(c) => c.stats(),
            Self::Tcp(c) => c.stats(),
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "dns-over-rustls")]
            Self::Dot(_) => "TLS",
            Self::Tcp(_) => "TCP",
        }
    }
}

#[async_trait]
impl DnsResolver for UpstreamClient {
    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, DomainError> {
        match self {
            #[cfg(feature = "dns-over-rustls")]
            Self::Dot(c) => c.resolve(query, client).await,
            Self::Tcp(c) => c.resolve(query, client).await,
        }
    }

    fn id(&self) -> &str {
        match self {
            #[cfg(feature = "dns-over-rustls")]
            Self::Dot(c) => c.id(),
            Self::Tcp(c) => c.id(),
        }
    }
}

impl fmt::Display for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "dns-over-rustls")]
            Self::Dot(c) => fmt::Display::fmt(c, f),
            Self::Tcp(c) => fmt::Display::fmt(c, f),
        }
    }
}

/// Build the client for one configured upstream.
pub fn create_client(config: &UpstreamConfig) -> Result<UpstreamClient, DomainError> {
    match config.protocol {
        #[cfg(feature = "dns-over-rustls")]
        DnsProtocol::Dot => Ok(UpstreamClient::Dot(DotClient::from_config(config)?)),
        #[cfg(not(feature = "dns-over-rustls"))]
        DnsProtocol::Dot => Err(DomainError::ConfigError(format!(
            "Upstream '{}' needs DNS-over-TLS support, which is not compiled in",
            config.id
        ))),
        DnsProtocol::Tcp => Ok(UpstreamClient::Tcp(TcpClient::from_config(config)?)),
    }
}

fn nonzero(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}

fn log_query(id: &str, protocol: &str, query: &Message, client: &ClientInfo) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let (name, record_type) = match query.queries().first() {
        Some(q) => (q.name().to_string(), q.query_type().to_string()),
        None => (String::from("-"), String::from("-")),
    };
    debug!(
        upstream = id,
        protocol,
        client = %client,
        id = query.id(),
        name = %name,
        record_type = %record_type,
        "Resolving query"
    );
}
