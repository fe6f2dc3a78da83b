pub mod errors;
pub mod logging;
pub mod root;
pub mod tls;
pub mod upstream;

pub use errors::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use root::{CliOverrides, Config};
pub use tls::TlsConfig;
pub use upstream::UpstreamConfig;
