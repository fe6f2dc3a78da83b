use anyhow::Context;
use dotline_domain::Config;
use dotline_infrastructure::dns::{create_client, UpstreamClient};
use std::sync::Arc;
use tracing::info;

/// One client per configured upstream.
pub struct Upstreams {
    clients: Vec<Arc<UpstreamClient>>,
}

impl Upstreams {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let clients = config
            .upstreams
            .iter()
            .map(|upstream| {
                let client = create_client(upstream)
                    .with_context(|| format!("Failed to set up upstream '{}'", upstream.id))?;
                info!(upstream = %client, protocol = client.protocol_name(), "Upstream ready");
                Ok(Arc::new(client))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { clients })
    }

    /// The upstream named `id`, or the first one configured.
    pub fn select(&self, id: Option<&str>) -> anyhow::Result<Arc<UpstreamClient>> {
        use dotline_application::ports::DnsResolver;

        let found = match id {
            Some(id) => self.clients.iter().find(|c| c.id() == id),
            None => self.clients.first(),
        };
        found
            .cloned()
            .with_context(|| format!("No upstream named '{}'", id.unwrap_or_default()))
    }
}
