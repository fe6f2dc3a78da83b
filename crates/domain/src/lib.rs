//! dotline domain layer
pub mod client;
pub mod config;
pub mod dns_protocol;
pub mod errors;

pub use client::ClientInfo;
pub use config::{
    CliOverrides, Config, ConfigError, LogFormat, LoggingConfig, TlsConfig, UpstreamConfig,
};
pub use dns_protocol::{DnsProtocol, Endpoint, UpstreamAddr, DEFAULT_DNS_PORT, DEFAULT_DOT_PORT};
pub use errors::DomainError;
