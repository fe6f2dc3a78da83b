#![allow(dead_code)]

use async_trait::async_trait;
use dotline_application::ports::DnsResolver;
use dotline_domain::{ClientInfo, DomainError};
use hickory_proto::op::{Message, MessageType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Answers every query with a copy of itself flagged as a response.
#[derive(Default)]
pub struct EchoResolver {
    pub calls: AtomicU64,
    pub last_client: Mutex<Option<ClientInfo>>,
}

#[async_trait]
impl DnsResolver for EchoResolver {
    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, DomainError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.last_client.lock().unwrap() = Some(*client);
        let mut response = query.clone();
        response.set_message_type(MessageType::Response);
        Ok(response)
    }

    fn id(&self) -> &str {
        "echo"
    }
}

/// Answers with a different ID than the query carried.
pub struct MismatchResolver;

#[async_trait]
impl DnsResolver for MismatchResolver {
    async fn resolve(&self, query: &Message, _client: &ClientInfo) -> Result<Message, DomainError> {
        let mut response = query.clone();
        response.set_id(query.id().wrapping_add(1));
        response.set_message_type(MessageType::Response);
        Ok(response)
    }

    fn id(&self) -> &str {
        "mismatch"
    }
}

pub struct FailingResolver {
    pub error: DomainError,
}

impl FailingResolver {
    pub fn new(error: DomainError) -> Arc<Self> {
        Arc::new(Self { error })
    }
}

#[async_trait]
impl DnsResolver for FailingResolver {
    async fn resolve(&self, _query: &Message, _client: &ClientInfo) -> Result<Message, DomainError> {
        Err(self.error.clone())
    }

    fn id(&self) -> &str {
        "failing"
    }
}
