use anyhow::Context;
use clap::Parser;
use dotline_application::use_cases::QueryUpstreamUseCase;
use dotline_domain::{CliOverrides, ClientInfo, DnsProtocol, UpstreamConfig};
use dotline_infrastructure::dns::UpstreamClient;
use futures::future::join_all;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

mod bootstrap;
mod di;

#[derive(Parser)]
#[command(name = "dotline")]
#[command(version)]
#[command(about = "Pipelined DNS-over-TLS stub resolver")]
struct Cli {
    /// Names to look up
    #[arg(required = true, value_name = "NAME")]
    names: Vec<String>,

    /// Record type to query
    #[arg(short = 't', long = "type", default_value = "A")]
    record_type: String,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Id of the configured upstream to use (default: the first one)
    #[arg(short = 'u', long)]
    upstream: Option<String>,

    /// Upstream endpoint to use instead of the configured ones
    #[arg(short = 'e', long, value_name = "HOST[:PORT]")]
    endpoint: Option<String>,

    /// IP to dial for --endpoint instead of looking its host up
    #[arg(short = 'b', long, requires = "endpoint")]
    bootstrap: Option<IpAddr>,

    /// Use plain TCP for --endpoint instead of TLS
    #[arg(long, requires = "endpoint")]
    tcp: bool,

    /// Send every name this many times, all at once
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Query timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print pipeline statistics as JSON when done
    #[arg(long)]
    stats: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn adhoc_upstream(&self) -> Option<UpstreamConfig> {
        let endpoint = self.endpoint.as_ref()?;
        let mut upstream = UpstreamConfig::new("cli", endpoint.as_str());
        upstream.bootstrap_address = self.bootstrap;
        if self.tcp {
            upstream.protocol = DnsProtocol::Tcp;
        }
        Some(upstream)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        log_level: cli.log_level.clone(),
        timeout_ms: cli.timeout_ms,
    };
    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides, cli.adhoc_upstream())?;
    bootstrap::init_logging(&config.logging)?;

    info!("Starting dotline v{}", env!("CARGO_PKG_VERSION"));

    let record_type = RecordType::from_str(&cli.record_type.to_ascii_uppercase())
        .with_context(|| format!("Unknown record type '{}'", cli.record_type))?;

    let upstreams = di::Upstreams::new(&config)?;
    let upstream = upstreams.select(cli.upstream.as_deref())?;

    let failed = run_queries(&upstream, &cli.names, record_type, cli.count.max(1)).await;

    if cli.stats {
        println!("{}", serde_json::to_string_pretty(&upstream.stats())?);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} queries failed", failed, cli.names.len() * cli.count.max(1));
    }
    Ok(())
}

/// Issue every query concurrently over the upstream's single connection and
/// print one line per result. Returns how many failed.
async fn run_queries(
    upstream: &Arc<UpstreamClient>,
    names: &[String],
    record_type: RecordType,
    count: usize,
) -> usize {
    let use_case = QueryUpstreamUseCase::new(upstream.clone());
    let client = ClientInfo::local();

    let lookups = names
        .iter()
        .flat_map(|name| std::iter::repeat(name.as_str()).take(count))
        .map(|name| {
            let use_case = &use_case;
            async move {
                let start = Instant::now();
                let result = use_case.execute(name, record_type, &client).await;
                (name, result, start.elapsed())
            }
        });

    let mut failed = 0;
    for (name, result, elapsed) in join_all(lookups).await {
        match result {
            Ok(response) => println!("{}", format_answer(name, record_type, &response, elapsed)),
            Err(e) => {
                failed += 1;
                warn!(name = %name, error = %e, "Query failed");
                println!("{} {} ERROR {}", name, record_type, e);
            }
        }
    }
    failed
}

fn format_answer(
    name: &str,
    record_type: RecordType,
    response: &Message,
    elapsed: std::time::Duration,
) -> String {
    let answers: Vec<String> = response
        .answers()
        .iter()
        .map(|record| record.data().to_string())
        .collect();

    format!(
        "{} {} {} {} ({} ms)",
        name,
        record_type,
        response.response_code(),
        if answers.is_empty() {
            "-".to_string()
        } else {
            answers.join(", ")
        },
        elapsed.as_millis()
    )
}
