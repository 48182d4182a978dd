//! Transport module for Pika
//!
//! Plain TCP plumbing shared by every mode: endpoint resolution, socket
//! options and the connect helper.

mod addr;

pub use addr::{resolve_endpoint, resolve_endpoint_v4, split_host_port};

use crate::config::TcpConfig;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Socket options for configuring connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl SocketOpts {
    /// Options for long-lived control channels
    pub fn for_control_channel() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(30),
            keepalive_interval: Some(10),
        }
    }

    /// Options for relayed data connections (no kernel keepalive)
    pub fn for_data_channel() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: None,
            keepalive_interval: None,
        }
    }

    /// Create socket options from TCP config
    pub fn from_tcp_config(config: &TcpConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs),
            keepalive_interval: Some(config.keepalive_interval),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }

    /// Apply options, logging instead of failing
    pub fn hint(&self, stream: &TcpStream) {
        if let Err(e) = self.apply(stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }
    }
}

/// Connect to `addr` and apply `opts` to the new stream
pub async fn connect(addr: SocketAddr, opts: &SocketOpts) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    opts.hint(&stream);
    tracing::debug!("TCP connection established to {}", addr);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_socket_opts_for_control_channel() {
        let opts = SocketOpts::for_control_channel();
        assert!(opts.nodelay);
        assert_eq!(opts.keepalive_secs, Some(30));
    }

    #[test]
    fn test_socket_opts_for_data_channel() {
        let opts = SocketOpts::for_data_channel();
        assert!(opts.nodelay);
        assert!(opts.keepalive_secs.is_none());
    }

    #[test]
    fn test_socket_opts_from_tcp_config() {
        let config = TcpConfig {
            nodelay: false,
            keepalive_secs: 60,
            keepalive_interval: 15,
        };
        let opts = SocketOpts::from_tcp_config(&config);
        assert!(!opts.nodelay);
        assert_eq!(opts.keepalive_secs, Some(60));
        assert_eq!(opts.keepalive_interval, Some(15));
    }

    #[tokio::test]
    async fn test_connect_applies_options() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = connect(addr, &SocketOpts::for_control_channel())
            .await
            .unwrap();
        assert!(stream.nodelay().unwrap());
        assert!(socket2::SockRef::from(&stream).keepalive().unwrap());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect(addr, &SocketOpts::for_data_channel()).await;
        assert!(result.is_err());
    }
}
