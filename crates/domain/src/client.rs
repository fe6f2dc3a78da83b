use std::fmt;
use std::net::IpAddr;

/// Information about the downstream client a query is resolved for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub source_ip: Option<IpAddr>,
}

impl ClientInfo {
    pub fn new(source_ip: IpAddr) -> Self {
        Self {
            source_ip: Some(source_ip),
        }
    }

    pub fn local() -> Self {
        Self::default()
    }
}

impl fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_ip {
            Some(ip) => write!(f, "{}", ip),
            None => f.write_str("local"),
        }
    }
}
