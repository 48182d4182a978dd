//! Control channel management
//!
//! Holds the exporter's long-lived connection to the controller. After the
//! bind request the controller only ever sends keepalives and client
//! announcements; each announcement spawns a data channel.

use super::data_channel::run_data_channel;
use crate::protocol::{read_frame, write_frame, Frame};
use crate::service::{RestartSignal, RunOutcome};
use crate::transport::{connect, SocketOpts};
use anyhow::{Context, Result};
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Control channel for one reverse tunnel
#[derive(Debug, Clone)]
pub struct ControlChannel {
    /// Exported service endpoint, resolved per data channel
    export: String,
    /// Controller control endpoint
    controller: SocketAddr,
    /// Where the controller should listen for public clients
    bind: SocketAddrV4,
    socket_opts: SocketOpts,
    restart_delay: Duration,
}

impl ControlChannel {
    /// Create a control channel
    pub fn new(
        export: String,
        controller: SocketAddr,
        bind: SocketAddrV4,
        socket_opts: SocketOpts,
        restart_delay: Duration,
    ) -> Self {
        ControlChannel {
            export,
            controller,
            bind,
            socket_opts,
            restart_delay,
        }
    }

    /// Run until cancelled; a lost control channel asks for a restart
    pub async fn run(&self, shutdown: CancellationToken) -> RunOutcome {
        match self.run_once(&shutdown).await {
            Ok(()) => {
                info!("Control channel closed");
                RunOutcome::Finished
            }
            Err(e) => {
                warn!(
                    "Control channel error: {:#}. Restarting in {:?}",
                    e, self.restart_delay
                );
                RunOutcome::Restart(RestartSignal::after(self.restart_delay))
            }
        }
    }

    async fn run_once(&self, shutdown: &CancellationToken) -> Result<()> {
        info!("Connecting to controller: {}", self.controller);
        let mut conn = connect(self.controller, &self.socket_opts)
            .await
            .context("Failed to connect to controller")?;

        write_frame(&mut conn, &Frame::BindRequest(self.bind))
            .await
            .context("Failed to send bind request")?;
        info!("Requested reverse tunnel on {}", self.bind);

        loop {
            let frame = tokio::select! {
                frame = read_frame(&mut conn) => frame?,
                _ = shutdown.cancelled() => return Ok(()),
            };

            match frame {
                Frame::IsRemoteRequest(id) => {
                    debug!(%id, "Public client announced");
                    let export = self.export.clone();
                    let controller = self.controller;
                    let token = shutdown.child_token();
                    tokio::spawn(async move {
                        match run_data_channel(export, controller, id, token).await {
                            Ok(stats) => debug!(
                                %id,
                                to_controller = stats.forward,
                                to_service = stats.backward,
                                "Data channel closed"
                            ),
                            Err(e) => warn!(%id, "Data channel error: {:#}", e),
                        }
                    });
                }
                Frame::Noop => debug!("Received keepalive"),
                other => warn!(%other, "Unexpected frame on control channel"),
            }
        }
    }
}
