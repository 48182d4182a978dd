//! One SOCKS5 client session
//!
//! A session walks `Handshake -> Request -> Reply -> Relaying -> Closed`.
//! Any failure before `Relaying` ends it; once relaying, it lasts until both
//! bridge directions finish.

use super::command::{parse_request, send_failure, send_reply, send_success};
use super::handshake::negotiate;
use super::types::TargetAddr;
use crate::bridge::{Bridge, BridgeStats};
use crate::error::{Socks5Error, Socks5ReplyCode};
use crate::transport::SocketOpts;
use anyhow::{anyhow, Result};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a session currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Negotiating the authentication method
    Handshake,
    /// Reading the CONNECT request
    Request,
    /// Connecting to the target and answering
    Reply,
    /// Relaying bytes
    Relaying,
    /// Done
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Handshake => "handshake",
            SessionState::Request => "request",
            SessionState::Reply => "reply",
            SessionState::Relaying => "relaying",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A client connection accepted by the SOCKS5 server
#[derive(Debug)]
pub struct Session {
    id: u64,
    client: TcpStream,
    peer: SocketAddr,
    state: SessionState,
}

impl Session {
    /// Wrap an accepted client
    pub fn new(id: u64, client: TcpStream, peer: SocketAddr) -> Self {
        Session {
            id,
            client,
            peer,
            state: SessionState::Handshake,
        }
    }

    /// Drive the session to completion
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<BridgeStats> {
        let established = tokio::select! {
            established = self.establish() => Some(established),
            _ = shutdown.cancelled() => None,
        };

        let target = match established {
            Some(Ok(target)) => target,
            Some(Err(e)) => {
                warn!(session = self.id, peer = %self.peer, state = %self.state, "Session aborted: {:#}", e);
                return Err(e);
            }
            None => {
                debug!(session = self.id, state = %self.state, "Session cancelled");
                return Err(anyhow!("session #{} cancelled during {}", self.id, self.state));
            }
        };

        self.state = SessionState::Relaying;
        info!(session = self.id, peer = %self.peer, "Setup session #{}", self.id);
        let stats = Bridge::new(self.client, target).start(shutdown).wait().await;
        self.state = SessionState::Closed;
        info!(
            session = self.id,
            state = %self.state,
            upload = stats.forward,
            download = stats.backward,
            "Close session #{}",
            self.id
        );
        Ok(stats)
    }

    async fn establish(&mut self) -> Result<TcpStream> {
        self.state = SessionState::Handshake;
        negotiate(&mut self.client).await?;

        self.state = SessionState::Request;
        let target = parse_request(&mut self.client).await?;
        debug!(session = self.id, %target, "CONNECT requested");

        self.state = SessionState::Reply;
        self.connect_target(&target).await
    }

    async fn connect_target(&mut self, target: &TargetAddr) -> Result<TcpStream> {
        let addr = match target.resolve().await {
            Ok(addr) => addr,
            Err(e) => {
                send_reply(
                    &mut self.client,
                    Socks5ReplyCode::HostUnreachable,
                    SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
                )
                .await?;
                return Err(e);
            }
        };

        match TcpStream::connect(SocketAddr::V4(addr)).await {
            Ok(stream) => {
                SocketOpts::for_data_channel().hint(&stream);
                let bound = match stream.peer_addr()? {
                    SocketAddr::V4(v4) => v4,
                    SocketAddr::V6(_) => addr,
                };
                send_success(&mut self.client, bound).await?;
                Ok(stream)
            }
            Err(e) => {
                let code = send_failure(&mut self.client, &e).await?;
                debug!(session = self.id, %target, ?code, "Target connect failed");
                Err(Socks5Error::TargetUnreachable {
                    target: target.to_string(),
                    source: e,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn session_pair(id: u64) -> (TcpStream, Session) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (server_side, peer) = accepted.unwrap();
        (client.unwrap(), Session::new(id, server_side, peer))
    }

    fn connect_request(target: SocketAddrV4) -> Vec<u8> {
        let mut request = vec![0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x01];
        request.extend_from_slice(&target.ip().octets());
        request.extend_from_slice(&target.port().to_be_bytes());
        request
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Relaying.to_string(), "relaying");
    }

    #[tokio::test]
    async fn test_session_connects_and_relays() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_addr = match target.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => unreachable!(),
        };

        let (mut client, session) = session_pair(1).await;
        let handle = tokio::spawn(session.run(CancellationToken::new()));

        client.write_all(&connect_request(target_addr)).await.unwrap();
        let (mut upstream, _) = target.accept().await.unwrap();

        let mut reply = [0u8; 12];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply[..2], &[0x05, 0x00]);
        assert_eq!(&reply[2..6], &[0x05, 0x00, 0x00, 0x01]);
        assert_eq!(&reply[6..10], &target_addr.ip().octets());
        assert_eq!(&reply[10..], &target_addr.port().to_be_bytes());

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(client);
        drop(upstream);
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.forward, 5);
    }

    #[tokio::test]
    async fn test_session_refused_target() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = match closed.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => unreachable!(),
        };
        drop(closed);

        let (mut client, session) = session_pair(2).await;
        let handle = tokio::spawn(session.run(CancellationToken::new()));

        client.write_all(&connect_request(closed_addr)).await.unwrap();
        let mut reply = [0u8; 12];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply[2..], &[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Socks5Error>(),
            Some(Socks5Error::TargetUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_session_unresolvable_domain_replies_host_unreachable() {
        let (mut client, session) = session_pair(4).await;
        let handle = tokio::spawn(session.run(CancellationToken::new()));

        let domain = b"pika-test.invalid";
        let mut request = vec![0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x03, domain.len() as u8];
        request.extend_from_slice(domain);
        request.extend_from_slice(&80u16.to_be_bytes());
        client.write_all(&request).await.unwrap();

        let mut reply = [0u8; 12];
        tokio::time::timeout(std::time::Duration::from_secs(30), client.read_exact(&mut reply))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&reply[..2], &[0x05, 0x00]);
        assert_eq!(&reply[2..], &[0x05, 0x04, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);

        // No relay follows the failure reply
        let mut byte = [0u8; 1];
        assert_eq!(client.read(&mut byte).await.unwrap_or(0), 0);
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_session_cancelled_during_handshake() {
        let (_client, session) = session_pair(3).await;
        let token = CancellationToken::new();
        let handle = tokio::spawn(session.run(token.clone()));

        token.cancel();
        assert!(handle.await.unwrap().is_err());
    }
}
