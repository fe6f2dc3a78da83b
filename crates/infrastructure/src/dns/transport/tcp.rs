use super::resolver::resolve_all;
use super::{BoxedStream, Connector};
use async_trait::async_trait;
use dotline_domain::{DomainError, UpstreamAddr};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Dials plain TCP connections, optionally from a fixed local address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    target: UpstreamAddr,
    local_addr: Option<IpAddr>,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(target: UpstreamAddr) -> Self {
        Self {
            target,
            local_addr: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_local_addr(mut self, local_addr: Option<IpAddr>) -> Self {
        self.local_addr = local_addr;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn target(&self) -> &UpstreamAddr {
        &self.target
    }

    pub fn local_addr(&self) -> Option<IpAddr> {
        self.local_addr
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Connect to the first reachable address of the target.
    pub async fn dial(&self) -> Result<TcpStream, DomainError> {
        let addrs = match &self.target {
            UpstreamAddr::Resolved(addr) => vec![*addr],
            UpstreamAddr::Unresolved { hostname, port } => {
                resolve_all(hostname, *port, self.connect_timeout).await?
            }
        };

        let mut last_err = None;
        for addr in addrs {
            match self.dial_addr(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(server = %addr, error = %e, "TCP connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DomainError::TransportConnect {
            server: self.target.to_string(),
            reason: "no addresses to dial".to_string(),
        }))
    }

    async fn dial_addr(&self, server_addr: SocketAddr) -> Result<TcpStream, DomainError> {
        let connect_err = |reason: String| DomainError::TransportConnect {
            server: server_addr.to_string(),
            reason,
        };

        let socket = if server_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| connect_err(format!("failed to create socket: {}", e)))?;

        if let Some(local) = self.local_addr {
            if local.is_ipv4() != server_addr.is_ipv4() {
                return Err(connect_err(format!(
                    "local address {} is not in the same family",
                    local
                )));
            }
            socket
                .bind(SocketAddr::new(local, 0))
                .map_err(|e| connect_err(format!("failed to bind {}: {}", local, e)))?;
        }

        let stream = tokio::time::timeout(self.connect_timeout, socket.connect(server_addr))
            .await
            .map_err(|_| connect_err("connect timed out".to_string()))?
            .map_err(|e| connect_err(e.to_string()))?;

        stream
            .set_nodelay(true)
            .map_err(|e| connect_err(format!("failed to set TCP_NODELAY: {}", e)))?;

        Ok(stream)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<BoxedStream, DomainError> {
        let stream = self.dial().await?;
        debug!(server = %self.target, "TCP connection established");
        Ok(Box::new(stream))
    }

    fn target(&self) -> &UpstreamAddr {
        &self.target
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}
