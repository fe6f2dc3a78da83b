use anyhow::Context;
use dotline_domain::{CliOverrides, Config, LogFormat, LoggingConfig, UpstreamConfig};
use tracing_subscriber::EnvFilter;

/// Load and validate the configuration. An upstream given on the command
/// line replaces the configured ones.
pub fn load_config(
    path: Option<&str>,
    cli_overrides: CliOverrides,
    adhoc_upstream: Option<UpstreamConfig>,
) -> anyhow::Result<Config> {
    let timeout_ms = cli_overrides.timeout_ms;
    let mut config = Config::load(path, cli_overrides).context("Failed to load configuration")?;

    if let Some(mut upstream) = adhoc_upstream {
        upstream.timeout_ms = timeout_ms.or(upstream.timeout_ms);
        config.upstreams = vec![upstream];
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Logs go to stderr so stdout only carries answers.
pub fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_adhoc_upstream_replaces_configured() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
            [[upstreams]]
            id = "configured"
            endpoint = "9.9.9.9"
            "#,
        )
        .unwrap();

        let overrides = CliOverrides {
            log_level: None,
            timeout_ms: Some(300),
        };
        let adhoc = UpstreamConfig::new("cli", "1.1.1.1");
        let config = load_config(file.path().to_str(), overrides, Some(adhoc)).unwrap();

        assert_eq!(config.upstreams.len(), 1);
        assert_eq!(config.upstreams[0].id, "cli");
        assert_eq!(config.upstreams[0].timeout_ms, Some(300));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[logging]\nlevel = \"info\"\n").unwrap();

        let result = load_config(file.path().to_str(), CliOverrides::default(), None);
        assert!(result.is_err());
    }
}
