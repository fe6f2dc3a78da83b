use dotline_domain::DomainError;
use std::net::SocketAddr;
use std::time::Duration;

/// Resolves a hostname to all its IP addresses (IPv4 + IPv6).
pub async fn resolve_all(
    hostname: &str,
    port: u16,
    timeout: Duration,
) -> Result<Vec<SocketAddr>, DomainError> {
    let target = format!("{}:{}", hostname, port);

    let addrs_iter = tokio::time::timeout(timeout, tokio::net::lookup_host(&target))
        .await
        .map_err(|_| DomainError::TransportConnect {
            server: target.clone(),
            reason: "hostname lookup timed out".to_string(),
        })?
        .map_err(|e| DomainError::TransportConnect {
            server: target.clone(),
            reason: format!("hostname lookup failed: {}", e),
        })?;

    let addrs: Vec<SocketAddr> = addrs_iter.collect();

    if addrs.is_empty() {
        return Err(DomainError::TransportConnect {
            server: target,
            reason: "no addresses found".to_string(),
        });
    }

    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addrs = resolve_all("localhost", 853, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(addrs.iter().all(|a| a.port() == 853));
        assert!(addrs.iter().any(|a| a.ip().is_loopback()));
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let addrs = resolve_all("127.0.0.1", 53, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:53".parse().unwrap()]);
    }
}
