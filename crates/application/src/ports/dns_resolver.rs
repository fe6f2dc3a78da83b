use async_trait::async_trait;
use dotline_domain::{ClientInfo, DomainError};
use hickory_proto::op::Message;

/// A single upstream resolver. Implementations must be safe to call from
/// many tasks at once.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, DomainError>;

    /// Identifier of the resolver as configured.
    fn id(&self) -> &str;
}
