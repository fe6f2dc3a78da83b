use dotline_application::ports::DnsResolver;
use dotline_application::use_cases::QueryUpstreamUseCase;
use dotline_domain::{ClientInfo, DomainError};
use futures::future::join_all;
use hickory_proto::op::MessageType;
use hickory_proto::rr::{Name, RecordType};
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

mod helpers;
use helpers::{EchoResolver, FailingResolver, MismatchResolver};

#[tokio::test]
async fn test_execute_returns_matching_response() {
    let resolver = Arc::new(EchoResolver::default());
    let use_case = QueryUpstreamUseCase::new(resolver.clone());
    let client = ClientInfo::new("192.168.1.20".parse().unwrap());

    let response = use_case
        .execute("example.com", RecordType::AAAA, &client)
        .await
        .unwrap();

    assert_eq!(response.message_type(), MessageType::Response);
    assert_eq!(
        response.queries()[0].name(),
        &Name::from_str("example.com").unwrap()
    );
    assert_eq!(response.queries()[0].query_type(), RecordType::AAAA);
    assert_eq!(*resolver.last_client.lock().unwrap(), Some(client));
}

#[tokio::test]
async fn test_execute_rejects_mismatched_id() {
    let use_case = QueryUpstreamUseCase::new(Arc::new(MismatchResolver));

    let result = use_case
        .execute("example.com", RecordType::A, &ClientInfo::local())
        .await;

    assert!(matches!(result, Err(DomainError::InvalidDnsMessage(_))));
}

#[tokio::test]
async fn test_execute_propagates_resolver_error() {
    let resolver = FailingResolver::new(DomainError::QueryTimeout {
        server: "192.0.2.1:853".into(),
    });
    let use_case = QueryUpstreamUseCase::new(resolver);

    let err = use_case
        .execute("example.com", RecordType::A, &ClientInfo::local())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_concurrent_executions_share_one_resolver() {
    let resolver = Arc::new(EchoResolver::default());
    let use_case = Arc::new(QueryUpstreamUseCase::new(
        resolver.clone() as Arc<dyn DnsResolver>
    ));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let use_case = Arc::clone(&use_case);
            tokio::spawn(async move {
                let domain = format!("host{}.example.com", i);
                let response = use_case
                    .execute(&domain, RecordType::A, &ClientInfo::local())
                    .await
                    .unwrap();
                (domain, response)
            })
        })
        .collect();

    for result in join_all(tasks).await {
        let (domain, response) = result.unwrap();
        assert_eq!(
            response.queries()[0].name(),
            &Name::from_str(&domain).unwrap()
        );
    }
    assert_eq!(resolver.calls.load(Ordering::Relaxed), 16);
}
