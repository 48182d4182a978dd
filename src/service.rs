//! Run outcomes and the service trait
//!
//! Every mode ([`Controller`](crate::controller::Controller),
//! [`Exporter`](crate::exporter::Exporter),
//! [`Socks5Server`](crate::socks::Socks5Server)) implements [`Service`] so the
//! bootstrap can drive any of them the same way. A run either finishes, asks
//! to be restarted, or fails; the three cases never share a channel.

use anyhow::Result;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest sleep a restart request may ask for
pub const MAX_RESTART_DELAY: Duration = Duration::from_secs(600);

/// A cooperative request to rebuild the runtime and run again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartSignal {
    delay: Duration,
}

impl RestartSignal {
    /// Request a restart after `delay`, clamped to [`MAX_RESTART_DELAY`]
    pub fn after(delay: Duration) -> Self {
        RestartSignal {
            delay: delay.min(MAX_RESTART_DELAY),
        }
    }

    /// How long the bootstrap should sleep before retrying
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// How a service run ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped because the token was cancelled
    Finished,
    /// Asked to be torn down and run again
    Restart(RestartSignal),
}

/// A top-level mode the bootstrap can run to completion
#[async_trait::async_trait]
pub trait Service: Send + Sync + Debug {
    /// Human-readable name of this service (e.g., "controller")
    fn name(&self) -> &str;

    /// Run until `shutdown` is cancelled, a restart is needed, or a fatal error
    async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<RunOutcome>;
}
