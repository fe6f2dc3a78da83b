use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to connect to {server}: {reason}")]
    TransportConnect { server: String, reason: String },

    #[error("Query to {server} timed out")]
    QueryTimeout { server: String },

    #[error("Connection to {server} lost: {reason}")]
    ConnectionLost { server: String, reason: String },

    #[error("Invalid stream frame: {0}")]
    Framing(String),

    #[error("Invalid DNS message: {0}")]
    InvalidDnsMessage(String),

    #[error("No free query id on connection to {server}")]
    IdSpaceExhausted { server: String },
}

impl DomainError {
    /// Whether a later attempt (on this or another upstream) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportConnect { .. }
                | Self::QueryTimeout { .. }
                | Self::ConnectionLost { .. }
                | Self::Framing(_)
        )
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::QueryTimeout { .. })
    }
}

impl From<ConfigError> for DomainError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
