//! Bootstrap glue
//!
//! Turns a [`Config`] into the service it selects and builds the runtime
//! each run happens in. The binary's restart loop is built from these.

use crate::config::{Config, ModeConfig, RuntimeConfig};
use crate::controller::Controller;
use crate::error::PikaError;
use crate::exporter::Exporter;
use crate::service::{RunOutcome, Service};
use crate::socks::Socks5Server;
use crate::transport::SocketOpts;
use anyhow::Result;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Build the service selected by `config`
pub fn build_service(config: &Config) -> Result<Arc<dyn Service>, PikaError> {
    config.validate()?;

    let restart_delay = Duration::from_secs(config.runtime.restart_delay_secs);
    let socket_opts = SocketOpts::from_tcp_config(&config.tcp);

    let service: Arc<dyn Service> = match config.mode()? {
        ModeConfig::Controller(c) => Arc::new(
            Controller::new(&c)
                .with_socket_opts(socket_opts)
                .with_restart_delay(restart_delay),
        ),
        ModeConfig::Exporter(e) => Arc::new(
            Exporter::new(&e)
                .with_socket_opts(socket_opts)
                .with_restart_delay(restart_delay),
        ),
        ModeConfig::Socks5(s) => {
            Arc::new(Socks5Server::new(&s).with_restart_delay(restart_delay))
        }
    };
    Ok(service)
}

/// Build a fresh runtime
///
/// `worker_threads` 0 keeps the tokio default, 1 selects the current-thread
/// flavour and any other value sizes the multi-thread pool.
pub fn build_runtime(config: &RuntimeConfig) -> io::Result<Runtime> {
    match config.worker_threads {
        0 => Builder::new_multi_thread().enable_all().build(),
        1 => Builder::new_current_thread().enable_all().build(),
        n => Builder::new_multi_thread()
            .worker_threads(n)
            .enable_all()
            .build(),
    }
}

/// Wait out `delay`, then run `service` until it finishes or asks to restart
///
/// Cancelling `shutdown` during the wait finishes without running.
pub async fn run_service(
    service: Arc<dyn Service>,
    delay: Duration,
    shutdown: CancellationToken,
) -> Result<RunOutcome> {
    if !delay.is_zero() {
        info!("Restarting {} in {:?}", service.name(), delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => return Ok(RunOutcome::Finished),
        }
    }

    info!("Starting {}", service.name());
    service.run(shutdown).await
}
