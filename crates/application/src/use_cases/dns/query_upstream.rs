use crate::ports::DnsResolver;
use dotline_domain::{ClientInfo, DomainError};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Looks up one name through one upstream resolver.
pub struct QueryUpstreamUseCase {
    resolver: Arc<dyn DnsResolver>,
}

impl QueryUpstreamUseCase {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        Self { resolver }
    }

    /// Build a standard recursive query with a random ID and a single question.
    pub fn build_query(domain: &str, record_type: RecordType) -> Result<Message, DomainError> {
        let name = Name::from_str(domain).map_err(|e| {
            DomainError::InvalidDnsMessage(format!("Invalid domain '{}': {}", domain, e))
        })?;

        let mut query = Query::query(name, record_type);
        query.set_query_class(DNSClass::IN);

        let mut message = Message::new();
        message
            .set_id(fastrand::u16(..))
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(query);

        Ok(message)
    }

    pub async fn execute(
        &self,
        domain: &str,
        record_type: RecordType,
        client: &ClientInfo,
    ) -> Result<Message, DomainError> {
        let query = Self::build_query(domain, record_type)?;
        let start = Instant::now();

        let response = self.resolver.resolve(&query, client).await?;

        if response.id() != query.id() {
            return Err(DomainError::InvalidDnsMessage(format!(
                "Response id {} does not match query id {}",
                response.id(),
                query.id()
            )));
        }
        if response.queries() != query.queries() {
            return Err(DomainError::InvalidDnsMessage(format!(
                "Response question does not match query for {}",
                domain
            )));
        }

        debug!(
            resolver = self.resolver.id(),
            domain = %domain,
            record_type = %record_type,
            rcode = %response.response_code(),
            answers = response.answers().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream answered"
        );

        Ok(response)
    }
}
