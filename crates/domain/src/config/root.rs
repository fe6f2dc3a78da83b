use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::tls::TlsConfig;
use super::upstream::UpstreamConfig;
use crate::dns_protocol::DnsProtocol;

/// Main configuration structure for dotline
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upstream resolvers, one pipeline each
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. dotline.toml in current directory
    /// 3. /etc/dotline/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("dotline.toml").exists() {
            Self::from_file("dotline.toml")?
        } else if std::path::Path::new("/etc/dotline/config.toml").exists() {
            Self::from_file("/etc/dotline/config.toml")?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            for upstream in &mut self.upstreams {
                upstream.timeout_ms = Some(timeout_ms);
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstreams.is_empty() {
            return Err(ConfigError::Validation(
                "No upstream servers configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for upstream in &self.upstreams {
            if upstream.id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Upstream '{}' has an empty id",
                    upstream.endpoint
                )));
            }
            if !seen.insert(upstream.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate upstream id '{}'",
                    upstream.id
                )));
            }

            upstream
                .parsed_endpoint()
                .map_err(|e| ConfigError::Validation(format!("{}: {}", upstream.id, e)))?;

            if upstream.timeout_ms == Some(0)
                || upstream.connect_timeout_ms == 0
                || upstream.idle_timeout_ms == 0
            {
                return Err(ConfigError::Validation(format!(
                    "Upstream '{}' has a zero timeout",
                    upstream.id
                )));
            }

            let tls = &upstream.tls;
            if tls.client_cert_file.is_some() != tls.client_key_file.is_some() {
                return Err(ConfigError::Validation(format!(
                    "Upstream '{}' needs both client_cert_file and client_key_file",
                    upstream.id
                )));
            }
            if upstream.protocol == DnsProtocol::Tcp && *tls != TlsConfig::default() {
                return Err(ConfigError::Validation(format!(
                    "Upstream '{}' uses plain TCP but has TLS settings",
                    upstream.id
                )));
            }
        }

        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub timeout_ms: Option<u64>,
}
