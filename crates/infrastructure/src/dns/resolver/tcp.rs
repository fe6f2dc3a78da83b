use super::{log_query, nonzero, DEFAULT_QUERY_TIMEOUT};
use crate::dns::pipeline::{Pipeline, PipelineStats, DEFAULT_IDLE_TIMEOUT};
use crate::dns::transport::tcp::DEFAULT_CONNECT_TIMEOUT;
use crate::dns::transport::TcpConnector;
use async_trait::async_trait;
use dotline_application::ports::DnsResolver;
use dotline_domain::{ClientInfo, DomainError, Endpoint, UpstreamConfig, DEFAULT_DNS_PORT};
use hickory_proto::op::Message;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct TcpClientOptions {
    pub local_address: Option<IpAddr>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

/// Plain DNS-over-TCP client sharing the DoT pipeline. Queries are not
/// padded since the stream is not encrypted.
pub struct TcpClient {
    id: Arc<str>,
    endpoint: Endpoint,
    timeout: Duration,
    pipeline: Pipeline,
}

impl TcpClient {
    pub fn new(id: &str, endpoint: &str, options: TcpClientOptions) -> Result<Self, DomainError> {
        let endpoint = Endpoint::parse(endpoint, DEFAULT_DNS_PORT)?;

        let connector = TcpConnector::new(endpoint.dial_target())
            .with_local_addr(options.local_address)
            .with_connect_timeout(
                nonzero(options.connect_timeout).unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            );
        let pipeline = Pipeline::with_idle_timeout(
            id,
            Arc::new(connector),
            nonzero(options.idle_timeout).unwrap_or(DEFAULT_IDLE_TIMEOUT),
        );

        Ok(Self {
            id: Arc::from(id),
            endpoint,
            timeout: nonzero(options.timeout).unwrap_or(DEFAULT_QUERY_TIMEOUT),
            pipeline,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, DomainError> {
        let options = TcpClientOptions {
            local_address: config.local_address,
            timeout: Some(config.query_timeout()),
            connect_timeout: Some(config.connect_timeout()),
            idle_timeout: Some(config.idle_timeout()),
        };
        Self::new(&config.id, &config.endpoint, options)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }
}

#[async_trait]
impl DnsResolver for TcpClient {
    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, DomainError> {
        log_query(&self.id, "tcp", query, client);
        self.pipeline.resolve(query.clone(), self.timeout).await
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for TcpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tcp://{})", self.id, self.endpoint)
    }
}
