pub mod resolver;
pub mod tcp;
#[cfg(feature = "dns-over-rustls")]
pub mod tls;

use async_trait::async_trait;
use dotline_domain::{DomainError, UpstreamAddr};
use tokio::io::{AsyncRead, AsyncWrite};

pub use tcp::TcpConnector;
#[cfg(feature = "dns-over-rustls")]
pub use tls::{build_client_config, TlsConnector};

/// Byte stream a pipeline can run on.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedStream = Box<dyn DuplexStream>;

/// Opens a fresh, ready-to-use stream to one upstream.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<BoxedStream, DomainError>;

    /// Address the stream is dialled to.
    fn target(&self) -> &UpstreamAddr;

    fn protocol_name(&self) -> &'static str;
}
