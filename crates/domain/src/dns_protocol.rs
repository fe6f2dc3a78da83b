use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

pub const DEFAULT_DOT_PORT: u16 = 853;
pub const DEFAULT_DNS_PORT: u16 = 53;

const MAX_HOSTNAME_LEN: usize = 253;

/// Stream protocol spoken with an upstream resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsProtocol {
    #[default]
    Dot,
    Tcp,
}

impl DnsProtocol {
    pub fn protocol_name(&self) -> &'static str {
        match self {
            DnsProtocol::Dot => "dot",
            DnsProtocol::Tcp => "tcp",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DnsProtocol::Dot => DEFAULT_DOT_PORT,
            DnsProtocol::Tcp => DEFAULT_DNS_PORT,
        }
    }
}

/// Represents an upstream server address that may or may not be resolved to an IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamAddr {
    Resolved(SocketAddr),
    Unresolved { hostname: Arc<str>, port: u16 },
}

impl UpstreamAddr {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            UpstreamAddr::Resolved(addr) => Some(*addr),
            UpstreamAddr::Unresolved { .. } => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            UpstreamAddr::Resolved(addr) => addr.port(),
            UpstreamAddr::Unresolved { port, .. } => *port,
        }
    }

    pub fn hostname_str(&self) -> Option<&str> {
        match self {
            UpstreamAddr::Resolved(_) => None,
            UpstreamAddr::Unresolved { hostname, .. } => Some(hostname),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, UpstreamAddr::Unresolved { .. })
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamAddr::Resolved(addr) => write!(f, "{}", addr),
            UpstreamAddr::Unresolved { hostname, port } => write!(f, "{}:{}", hostname, port),
        }
    }
}

/// A validated `host:port` upstream endpoint as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: Arc<str>,
    port: u16,
}

impl Endpoint {
    /// Parses `host:port`, `[v6]:port`, or a bare host that gets `default_port`.
    pub fn parse(s: &str, default_port: u16) -> Result<Self, DomainError> {
        let invalid = |why: &str| {
            DomainError::ConfigError(format!("Invalid endpoint '{}': {}", s, why))
        };

        if s.is_empty() {
            return Err(invalid("empty"));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let end = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
            let host = &rest[..end];
            if host.parse::<Ipv6Addr>().is_err() {
                return Err(invalid("bracketed host is not an IPv6 address"));
            }
            match &rest[end + 1..] {
                "" => (host, None),
                tail => {
                    let port_str = tail
                        .strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected text after ']'"))?;
                    (host, Some(port_str))
                }
            }
        } else if s.parse::<Ipv6Addr>().is_ok() {
            (s, None)
        } else {
            match s.rsplit_once(':') {
                Some((host, port_str)) => (host, Some(port_str)),
                None => (s, None),
            }
        };

        let port = match port {
            Some(port_str) => match port_str.parse::<u16>() {
                Ok(0) | Err(_) => return Err(invalid("port must be a number in 1-65535")),
                Ok(port) => port,
            },
            None => default_port,
        };

        if host.parse::<IpAddr>().is_err() && !is_valid_hostname(host) {
            return Err(invalid("host is neither an IP address nor a hostname"));
        }

        Ok(Self {
            host: host.into(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Address to dial when no bootstrap address is configured.
    pub fn dial_target(&self) -> UpstreamAddr {
        match self.ip() {
            Some(ip) => UpstreamAddr::Resolved(SocketAddr::new(ip, self.port)),
            None => UpstreamAddr::Unresolved {
                hostname: self.host.clone(),
                port: self.port,
            },
        }
    }

    /// Address to dial when the upstream is reached through `bootstrap`.
    pub fn bootstrap_target(&self, bootstrap: IpAddr) -> UpstreamAddr {
        UpstreamAddr::Resolved(SocketAddr::new(bootstrap, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn is_valid_hostname(host: &str) -> bool {
    let name = host.strip_suffix('.').unwrap_or(host);
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    })
}
