//! SOCKS5 server module for Pika
//!
//! A standalone SOCKS5 proxy: no-auth negotiation, CONNECT only, IPv4 and
//! domain targets. Each accepted client runs as its own [`Session`].

mod command;
mod consts;
mod handshake;
mod session;
mod types;

pub use command::{encode_reply, parse_request, send_failure, send_reply, send_success};
pub use consts::*;
pub use handshake::negotiate;
pub use session::{Session, SessionState};
pub use types::TargetAddr;

use crate::config::Socks5Config;
use crate::service::{RestartSignal, RunOutcome, Service};
use crate::transport::resolve_endpoint;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// SOCKS5 proxy server
#[derive(Debug)]
pub struct Socks5Server {
    listen: String,
    restart_delay: Duration,
    next_session: AtomicU64,
}

impl Socks5Server {
    /// Create a server from its configuration
    pub fn new(config: &Socks5Config) -> Self {
        Socks5Server {
            listen: config.listen.clone(),
            restart_delay: Duration::from_secs(5),
            next_session: AtomicU64::new(1),
        }
    }

    /// Delay requested when the listener fails
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Bind the client listener
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = resolve_endpoint(&self.listen).await?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind SOCKS5 server on {}", addr))?;
        info!("SOCKS5 server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept clients on an already bound listener
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<RunOutcome> {
        loop {
            let (client, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept SOCKS5 client: {}", e);
                        return Ok(RunOutcome::Restart(RestartSignal::after(self.restart_delay)));
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("SOCKS5 server shutting down");
                    return Ok(RunOutcome::Finished);
                }
            };

            let id = self.next_session.fetch_add(1, Ordering::Relaxed);
            debug!(session = id, %peer, "SOCKS5 client accepted");

            let session = Session::new(id, client, peer);
            // Failures are logged by the session itself
            tokio::spawn(session.run(shutdown.child_token()));
        }
    }
}

#[async_trait::async_trait]
impl Service for Socks5Server {
    fn name(&self) -> &str {
        "socks5"
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<RunOutcome> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}
