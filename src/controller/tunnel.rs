//! Reverse tunnel
//!
//! Opened when an exporter sends a `BindRequest`. The tunnel listens on the
//! requested endpoint, parks every accepted public client in its registry
//! and tells the exporter about it over the control channel. A monitor task
//! writes a `Noop` every keepalive period; the first failed write tears the
//! tunnel down and closes the listener.

use super::registry::{PendingClients, TunnelDirectory, TunnelRegistration};
use crate::protocol::{client_id_for, write_frame, Frame};
use anyhow::{Context, Result};
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One exporter's reverse tunnel
#[derive(Debug)]
pub struct ReverseTunnel {
    control: TcpStream,
    bind: SocketAddrV4,
    keepalive_period: Duration,
    directory: TunnelDirectory,
}

impl ReverseTunnel {
    /// Tunnel for `control`, to be opened on `bind`
    pub fn new(
        control: TcpStream,
        bind: SocketAddrV4,
        keepalive_period: Duration,
        directory: TunnelDirectory,
    ) -> Self {
        ReverseTunnel {
            control,
            bind,
            keepalive_period,
            directory,
        }
    }

    /// Listen and accept until the control channel fails or `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(SocketAddr::V4(self.bind))
            .await
            .with_context(|| format!("Failed to open reverse tunnel on {}", self.bind))?;
        let local = listener.local_addr()?;
        info!("Reverse tunnel start listening on {}", local);

        let result = self.serve(listener, shutdown).await;
        info!("Reverse tunnel closed listening on {}", local);
        result
    }

    async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let registration = self.directory.register(Arc::new(PendingClients::new()));

        let tunnel = shutdown.child_token();
        // Stops the monitor whichever way the accept loop exits
        let _stop_monitor = tunnel.clone().drop_guard();

        let control = Arc::new(Mutex::new(self.control));
        tokio::spawn(monitor_control_channel(
            control.clone(),
            self.keepalive_period,
            tunnel.clone(),
        ));

        loop {
            let (socket, peer) = tokio::select! {
                accepted = listener.accept() => {
                    accepted.with_context(|| "Failed to accept public client")?
                }
                _ = tunnel.cancelled() => {
                    debug!("Reverse tunnel on {} cancelled", self.bind);
                    break;
                }
            };

            let id = client_id_for(&peer);
            if let Err(socket) = registration.insert(id, socket) {
                warn!(%peer, %id, "Client id already pending, dropping new client");
                drop(socket);
                continue;
            }
            debug!(%peer, %id, "Public client registered");

            let mut conn = control.lock().await;
            if let Err(e) = write_frame(&mut *conn, &Frame::IsRemoteRequest(id)).await {
                drop(conn);
                log_unclaimed(&registration);
                return Err(e).with_context(|| format!("Failed to announce client {}", id));
            }
        }

        log_unclaimed(&registration);
        Ok(())
    }
}

fn log_unclaimed(registration: &TunnelRegistration) {
    let pending = registration.registry();
    if !pending.is_empty() {
        info!(pending = pending.len(), "Closing unclaimed public clients");
    }
}

/// Write a keepalive every `period`; cancel `tunnel` on the first failure
pub async fn monitor_control_channel<W>(
    control: Arc<Mutex<W>>,
    period: Duration,
    tunnel: CancellationToken,
) where
    W: AsyncWrite + Unpin + Send,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tunnel.cancelled() => return,
        }

        let mut conn = control.lock().await;
        if let Err(e) = write_frame(&mut *conn, &Frame::Noop).await {
            warn!("Keepalive failed, closing reverse tunnel: {:#}", e);
            tunnel.cancel();
            return;
        }
        debug!("Keepalive sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FRAME_LEN;
    use std::io;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_monitor_cancels_tunnel_on_broken_pipe() {
        let mock = Builder::new()
            .write(&[0u8; FRAME_LEN])
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
            .build();
        let tunnel = CancellationToken::new();

        tokio::time::timeout(
            Duration::from_secs(5),
            monitor_control_channel(
                Arc::new(Mutex::new(mock)),
                Duration::from_millis(10),
                tunnel.clone(),
            ),
        )
        .await
        .unwrap();

        assert!(tunnel.is_cancelled());
    }

    #[tokio::test]
    async fn test_monitor_stops_when_tunnel_cancelled() {
        let mock = Builder::new().build();
        let tunnel = CancellationToken::new();
        tunnel.cancel();

        monitor_control_channel(
            Arc::new(Mutex::new(mock)),
            Duration::from_secs(60),
            tunnel,
        )
        .await;
    }

    #[tokio::test]
    async fn test_tunnel_bind_failure() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (control, _peer) = tokio::join!(TcpStream::connect(addr), listener.accept());

        let tunnel = ReverseTunnel::new(
            control.unwrap(),
            SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, port),
            Duration::from_secs(10),
            TunnelDirectory::new(),
        );
        let result = tunnel.run(CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
