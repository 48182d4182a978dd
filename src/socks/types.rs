//! SOCKS5 type definitions

use anyhow::{Context, Result};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Destination requested by a CONNECT
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IPv4 address with port
    Ipv4(SocketAddrV4),
    /// Domain name with port, resolved when connecting
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a target from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ipv4(SocketAddrV4::new(ip, port))
    }

    /// Create a target from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// Resolve to an IPv4 socket address
    ///
    /// Domain names take the first IPv4 result of the lookup.
    pub async fn resolve(&self) -> Result<SocketAddrV4> {
        match self {
            TargetAddr::Ipv4(addr) => Ok(*addr),
            TargetAddr::Domain(domain, port) => {
                let mut addrs = tokio::net::lookup_host((domain.as_str(), *port))
                    .await
                    .with_context(|| format!("Failed to resolve domain: {}", domain))?;
                addrs
                    .find_map(|addr| match addr {
                        SocketAddr::V4(v4) => Some(v4),
                        SocketAddr::V6(_) => None,
                    })
                    .with_context(|| format!("No IPv4 address found for domain: {}", domain))
            }
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ipv4(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}
