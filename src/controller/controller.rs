//! Controller
//!
//! Accepts control connections from exporters and dispatches each on its
//! first frame: a bind request opens a reverse tunnel, a connect request
//! pairs the connection with a pending public client.

use super::registry::TunnelDirectory;
use super::tunnel::ReverseTunnel;
use crate::bridge::Bridge;
use crate::config::ControllerConfig;
use crate::error::PikaError;
use crate::protocol::{read_frame, ClientId, Frame};
use crate::service::{RestartSignal, RunOutcome, Service};
use crate::transport::{resolve_endpoint, SocketOpts};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Public-side endpoint of the reverse proxy
#[derive(Debug)]
pub struct Controller {
    listen: String,
    keepalive_period: Duration,
    socket_opts: SocketOpts,
    restart_delay: Duration,
    directory: TunnelDirectory,
}

impl Controller {
    /// Create a controller from its configuration
    pub fn new(config: &ControllerConfig) -> Self {
        Controller {
            listen: config.listen.clone(),
            keepalive_period: Duration::from_secs(config.keepalive_period_secs),
            socket_opts: SocketOpts::for_control_channel(),
            restart_delay: Duration::from_secs(5),
            directory: TunnelDirectory::new(),
        }
    }

    /// Socket options applied to control channels that open a tunnel
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Delay requested when the control listener fails
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Directory of the tunnels this controller currently runs
    pub fn directory(&self) -> &TunnelDirectory {
        &self.directory
    }

    /// Bind the control listener
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = resolve_endpoint(&self.listen).await?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind controller on {}", addr))?;
        info!("Controller listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept control connections on an already bound listener
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<RunOutcome> {
        loop {
            let (socket, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept control connection: {}", e);
                        return Ok(RunOutcome::Restart(RestartSignal::after(self.restart_delay)));
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("Controller shutting down");
                    return Ok(RunOutcome::Finished);
                }
            };
            debug!(%peer, "Control connection accepted");

            let session = ControlSession {
                keepalive_period: self.keepalive_period,
                socket_opts: self.socket_opts.clone(),
                directory: self.directory.clone(),
            };
            let token = shutdown.child_token();
            tokio::spawn(async move {
                if let Err(e) = session.handle(socket, peer, token).await {
                    warn!(%peer, "Control connection failed: {:#}", e);
                }
            });
        }
    }
}

#[async_trait::async_trait]
impl Service for Controller {
    fn name(&self) -> &str {
        "controller"
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<RunOutcome> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}

/// State a per-connection task needs, without a handle back to the controller
struct ControlSession {
    keepalive_period: Duration,
    socket_opts: SocketOpts,
    directory: TunnelDirectory,
}

impl ControlSession {
    async fn handle(
        self,
        mut socket: TcpStream,
        peer: SocketAddr,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let frame = tokio::select! {
            frame = read_frame(&mut socket) => frame?,
            _ = shutdown.cancelled() => return Ok(()),
        };
        debug!(%peer, %frame, "Control frame received");

        match frame {
            Frame::BindRequest(bind) => {
                self.socket_opts.hint(&socket);
                ReverseTunnel::new(socket, bind, self.keepalive_period, self.directory)
                    .run(shutdown)
                    .await
            }
            Frame::ConnectWithId(id) => {
                let pending = match self.claim(id) {
                    Ok(pending) => pending,
                    Err(e) => {
                        warn!(%peer, %id, "{}", e);
                        return Ok(());
                    }
                };
                let stats = Bridge::new(pending, socket).start(shutdown).wait().await;
                info!(
                    %peer,
                    %id,
                    to_exporter = stats.forward,
                    to_client = stats.backward,
                    "Public client session closed"
                );
                Ok(())
            }
            other => {
                debug!(%peer, %other, "Ignoring frame on fresh control connection");
                Ok(())
            }
        }
    }

    fn claim(&self, id: ClientId) -> Result<TcpStream, PikaError> {
        self.directory.claim(id).ok_or(PikaError::Lookup(id.get()))
    }
}
