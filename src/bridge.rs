//! Bidirectional byte relay
//!
//! A [`Bridge`] pairs two connected sockets and pumps bytes between them in
//! two independent tasks. Each task owns one read half and the opposite write
//! half, so both sockets stay open until both directions have finished.
//!
//! When a direction stops, for whatever reason, it shuts down the receive
//! side of its source and the send side of its destination. The peer on the
//! far end therefore sees an orderly EOF on its read path while the other
//! direction keeps flowing.

use std::fmt;
use std::io;
use std::net::{Shutdown, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Size of the per-direction relay buffer
pub const RELAY_BUFFER_SIZE: usize = 4096;

/// Two established sockets waiting to be relayed
#[derive(Debug)]
pub struct Bridge {
    first: TcpStream,
    second: TcpStream,
}

/// Handle to a running bridge
///
/// Dropping the handle detaches the relay tasks; they keep running until
/// their sockets close.
#[derive(Debug)]
pub struct BridgeHandle {
    forward: JoinHandle<u64>,
    backward: JoinHandle<u64>,
}

/// Bytes relayed by a finished bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Bytes copied from the first socket to the second
    pub forward: u64,
    /// Bytes copied from the second socket to the first
    pub backward: u64,
}

#[derive(Debug, Clone)]
struct Direction {
    from: Option<SocketAddr>,
    to: Option<SocketAddr>,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(addr: &Option<SocketAddr>) -> String {
            addr.map(|a| a.to_string())
                .unwrap_or_else(|| "?".to_string())
        }
        write!(f, "{} -> {}", side(&self.from), side(&self.to))
    }
}

impl Bridge {
    /// Pair two connected sockets
    pub fn new(first: TcpStream, second: TcpStream) -> Self {
        Bridge { first, second }
    }

    /// Spawn both relay directions and return without waiting for them
    ///
    /// Cancelling `shutdown` stops both directions, with the usual half-close.
    pub fn start(self, shutdown: CancellationToken) -> BridgeHandle {
        let first_peer = self.first.peer_addr().ok();
        let second_peer = self.second.peer_addr().ok();

        let (first_read, first_write) = self.first.into_split();
        let (second_read, second_write) = self.second.into_split();

        let forward = tokio::spawn(relay(
            first_read,
            second_write,
            shutdown.clone(),
            Direction {
                from: first_peer,
                to: second_peer,
            },
        ));
        let backward = tokio::spawn(relay(
            second_read,
            first_write,
            shutdown,
            Direction {
                from: second_peer,
                to: first_peer,
            },
        ));

        BridgeHandle { forward, backward }
    }
}

impl BridgeHandle {
    /// Wait for both directions to finish
    pub async fn wait(self) -> BridgeStats {
        let forward = self.forward.await.unwrap_or_default();
        let backward = self.backward.await.unwrap_or_default();
        debug!(forward, backward, "Bridge closed");
        BridgeStats { forward, backward }
    }
}

/// Copy one direction until EOF, error or cancellation, then half-close
async fn relay(
    mut from: OwnedReadHalf,
    mut to: OwnedWriteHalf,
    shutdown: CancellationToken,
    direction: Direction,
) -> u64 {
    let mut total = 0u64;

    match pump(&mut from, &mut to, &shutdown, &mut total).await {
        Ok(()) => debug!(%direction, bytes = total, "Relay finished"),
        Err(e) => warn!(%direction, bytes = total, "Relay error: {}", e),
    }

    if let Err(e) = socket2::SockRef::from(from.as_ref()).shutdown(Shutdown::Read) {
        debug!(%direction, "Failed to shut down receive side: {}", e);
    }
    if let Err(e) = to.shutdown().await {
        debug!(%direction, "Failed to shut down send side: {}", e);
    }

    total
}

async fn pump(
    from: &mut OwnedReadHalf,
    to: &mut OwnedWriteHalf,
    shutdown: &CancellationToken,
    total: &mut u64,
) -> io::Result<()> {
    let mut buf = [0u8; RELAY_BUFFER_SIZE];

    loop {
        let n = tokio::select! {
            read = from.read(&mut buf) => read?,
            _ = shutdown.cancelled() => return Ok(()),
        };
        if n == 0 {
            return Ok(());
        }

        tokio::select! {
            written = to.write_all(&buf[..n]) => written?,
            _ = shutdown.cancelled() => return Ok(()),
        }
        *total += n as u64;
    }
}
