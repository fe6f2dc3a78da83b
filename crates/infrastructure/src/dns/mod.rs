pub mod codec;
pub mod pipeline;
pub mod resolver;
pub mod transport;

pub use pipeline::{Pipeline, PipelineStats};
#[cfg(feature = "dns-over-rustls")]
pub use resolver::{DotClient, DotClientOptions};
pub use resolver::{create_client, TcpClient, TcpClientOptions, UpstreamClient};
pub use transport::{BoxedStream, Connector};
