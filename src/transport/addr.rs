//! Endpoint resolution
//!
//! Turns `"host:port"` strings into socket addresses. An empty host means
//! "any address" so `":7000"` listens on every interface.

use anyhow::{anyhow, bail, Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

/// Split a `"host:port"` string on its last colon
///
/// Brackets around an IPv6 literal host are stripped.
pub fn split_host_port(endpoint: &str) -> Result<(&str, u16)> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Endpoint '{}' is missing a port", endpoint))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port in endpoint '{}'", endpoint))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host, port))
}

/// Resolve an endpoint string to the first matching socket address
pub async fn resolve_endpoint(endpoint: &str) -> Result<SocketAddr> {
    let (host, port) = split_host_port(endpoint)?;

    if host.is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve address: {}", endpoint))?
        .next()
        .with_context(|| format!("No addresses found for: {}", endpoint))
}

/// Resolve an endpoint that must be IPv4, as carried by a bind request
pub async fn resolve_endpoint_v4(endpoint: &str) -> Result<SocketAddrV4> {
    let (host, port) = split_host_port(endpoint)?;

    if host.is_empty() {
        return Ok(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    }

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve address: {}", endpoint))?;

    match addrs.find_map(|addr| match addr {
        SocketAddr::V4(v4) => Some(v4),
        SocketAddr::V6(_) => None,
    }) {
        Some(v4) => Ok(v4),
        None => bail!("No IPv4 address found for: {}", endpoint),
    }
}
