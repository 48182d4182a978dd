//! Exporter
//!
//! Runs next to the service being exposed. It keeps one control channel to
//! the controller and opens a data channel for every public client the
//! controller announces.

mod control_channel;
mod data_channel;

pub use control_channel::ControlChannel;
pub use data_channel::run_data_channel;

use crate::config::ExporterConfig;
use crate::service::{RestartSignal, RunOutcome, Service};
use crate::transport::{resolve_endpoint, resolve_endpoint_v4, SocketOpts};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Private-side endpoint of the reverse proxy
#[derive(Debug)]
pub struct Exporter {
    export: String,
    controller: String,
    bind: String,
    socket_opts: SocketOpts,
    restart_delay: Duration,
}

impl Exporter {
    /// Create an exporter from its configuration
    pub fn new(config: &ExporterConfig) -> Self {
        Exporter {
            export: config.export.clone(),
            controller: config.controller.clone(),
            bind: config.bind.clone(),
            socket_opts: SocketOpts::for_control_channel(),
            restart_delay: Duration::from_secs(5),
        }
    }

    /// Socket options for the control channel
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Delay requested when the control channel is lost
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }
}

#[async_trait::async_trait]
impl Service for Exporter {
    fn name(&self) -> &str {
        "exporter"
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<RunOutcome> {
        let bind = resolve_endpoint_v4(&self.bind)
            .await
            .with_context(|| format!("Invalid tunnel bind endpoint {}", self.bind))?;

        let controller = match resolve_endpoint(&self.controller).await {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Failed to resolve controller {}: {:#}", self.controller, e);
                return Ok(RunOutcome::Restart(RestartSignal::after(self.restart_delay)));
            }
        };

        info!(
            "Exporting {} through {} (tunnel on {})",
            self.export, controller, bind
        );

        let channel = ControlChannel::new(
            self.export.clone(),
            controller,
            bind,
            self.socket_opts.clone(),
            self.restart_delay,
        );
        Ok(channel.run(shutdown).await)
    }
}
