//! Test utilities for Pika
//!
//! This module provides common helpers used across integration tests.

#![allow(dead_code)]

use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Upper bound for any single wait in integration tests
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a test TCP listener on an available loopback port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Create a connected TCP stream pair for testing
pub async fn create_tcp_stream_pair() -> (TcpStream, TcpStream) {
    let (listener, addr) = create_test_listener().await;
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (client.unwrap(), accepted.unwrap().0)
}

/// A loopback port that nothing listens on right now
pub async fn free_port() -> SocketAddrV4 {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    as_v4(addr)
}

/// Narrow a loopback address to IPv4
pub fn as_v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(v6) => panic!("Expected an IPv4 address, got {}", v6),
    }
}

/// Spawn an echo server and return its address
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });
    addr
}

/// Connect to `addr`, retrying while the listener is still coming up
pub async fn connect_with_retry(addr: SocketAddr) -> TcpStream {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return stream,
            Err(e) if tokio::time::Instant::now() >= deadline => {
                panic!("Failed to connect to {}: {}", addr, e)
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
}

/// Write `payload` and expect it echoed back
pub async fn assert_echo(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    tokio::time::timeout(TEST_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("echo timed out")
        .unwrap();
    assert_eq!(buf, payload);
}

/// Method negotiation offering only "no authentication"
pub fn socks5_greeting() -> Vec<u8> {
    vec![0x05, 0x01, 0x00]
}

/// CONNECT request for an IPv4 target
pub fn socks5_connect_ipv4(target: SocketAddrV4) -> Vec<u8> {
    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    request.extend_from_slice(&target.ip().octets());
    request.extend_from_slice(&target.port().to_be_bytes());
    request
}

/// CONNECT request for a domain target
pub fn socks5_connect_domain(domain: &str, port: u16) -> Vec<u8> {
    let mut request = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
    request.extend_from_slice(domain.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    request
}
