use super::{log_query, nonzero, DEFAULT_QUERY_TIMEOUT};
use crate::dns::codec::pad_query;
use crate::dns::pipeline::{Pipeline, PipelineStats, DEFAULT_IDLE_TIMEOUT};
use crate::dns::transport::tcp::DEFAULT_CONNECT_TIMEOUT;
use crate::dns::transport::{build_client_config, Connector, TcpConnector, TlsConnector};
use async_trait::async_trait;
use dotline_application::ports::DnsResolver;
use dotline_domain::{
    ClientInfo, DomainError, Endpoint, UpstreamAddr, UpstreamConfig, DEFAULT_DOT_PORT,
};
use hickory_proto::op::Message;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Optional settings of a [`DotClient`]. Unset or zero values take defaults.
#[derive(Clone, Default)]
pub struct DotClientOptions {
    /// IP to dial instead of looking up the endpoint host. The certificate
    /// is still verified against the endpoint host.
    pub bootstrap_address: Option<IpAddr>,
    pub local_address: Option<IpAddr>,
    /// Defaults to the bundled web PKI roots without a client certificate.
    pub tls_config: Option<Arc<rustls::ClientConfig>>,
    /// Name to verify the certificate against when no bootstrap is set.
    pub server_name: Option<String>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl DotClientOptions {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, DomainError> {
        Ok(Self {
            bootstrap_address: config.bootstrap_address,
            local_address: config.local_address,
            tls_config: Some(build_client_config(&config.tls)?),
            server_name: config.tls.server_name.clone(),
            timeout: Some(config.query_timeout()),
            connect_timeout: Some(config.connect_timeout()),
            idle_timeout: Some(config.idle_timeout()),
        })
    }
}

/// DNS-over-TLS client pipelining all queries over one connection.
pub struct DotClient {
    id: Arc<str>,
    endpoint: Endpoint,
    dial_target: UpstreamAddr,
    server_name: Arc<str>,
    timeout: Duration,
    pipeline: Pipeline,
}

impl DotClient {
    /// Validate the endpoint and set the client up. No connection is made
    /// until the first query.
    pub fn new(id: &str, endpoint: &str, options: DotClientOptions) -> Result<Self, DomainError> {
        let endpoint = Endpoint::parse(endpoint, DEFAULT_DOT_PORT)?;

        let (dial_target, server_name) = match options.bootstrap_address {
            Some(ip) => (endpoint.bootstrap_target(ip), endpoint.host().to_string()),
            None => (
                endpoint.dial_target(),
                options
                    .server_name
                    .unwrap_or_else(|| endpoint.host().to_string()),
            ),
        };

        let tls_config = match options.tls_config {
            Some(config) => config,
            None => build_client_config(&Default::default())?,
        };

        let tcp = TcpConnector::new(dial_target.clone())
            .with_local_addr(options.local_address)
            .with_connect_timeout(
                nonzero(options.connect_timeout).unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            );
        let connector = TlsConnector::new(tcp, &server_name, tls_config)?;

        Ok(Self::assemble(
            id,
            endpoint,
            dial_target,
            Arc::from(server_name),
            Arc::new(connector),
            options.timeout,
            options.idle_timeout,
        ))
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, DomainError> {
        Self::new(&config.id, &config.endpoint, DotClientOptions::from_config(config)?)
    }

    /// Run the client over an arbitrary connector. The connector is
    /// expected to hand back streams that are already encrypted.
    pub fn with_connector(
        id: &str,
        endpoint: &str,
        connector: Arc<dyn Connector>,
        timeout: Option<Duration>,
    ) -> Result<Self, DomainError> {
        let endpoint = Endpoint::parse(endpoint, DEFAULT_DOT_PORT)?;
        let dial_target = connector.target().clone();
        let server_name = Arc::from(endpoint.host());
        Ok(Self::assemble(
            id,
            endpoint,
            dial_target,
            server_name,
            connector,
            timeout,
            None,
        ))
    }

    fn assemble(
        id: &str,
        endpoint: Endpoint,
        dial_target: UpstreamAddr,
        server_name: Arc<str>,
        connector: Arc<dyn Connector>,
        timeout: Option<Duration>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let pipeline = Pipeline::with_idle_timeout(
            id,
            connector,
            nonzero(idle_timeout).unwrap_or(DEFAULT_IDLE_TIMEOUT),
        );
        Self {
            id: Arc::from(id),
            endpoint,
            dial_target,
            server_name,
            timeout: nonzero(timeout).unwrap_or(DEFAULT_QUERY_TIMEOUT),
            pipeline,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Address the TCP connection is made to.
    pub fn dial_target(&self) -> &UpstreamAddr {
        &self.dial_target
    }

    /// Name the server certificate is verified against.
    pub fn tls_server_name(&self) -> &str {
        &self.server_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }
}

#[async_trait]
impl DnsResolver for DotClient {
    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, DomainError> {
        log_query(&self.id, "dot", query, client);

        let mut query = query.clone();
        pad_query(&mut query)?;
        self.pipeline.resolve(query, self.timeout).await
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tls://{})", self.id, self.endpoint)
    }
}
