//! Runtime configuration
//!
//! Controls how the bootstrap builds the async runtime and how long it
//! waits before rebuilding it after a restart request.

use serde::{Deserialize, Serialize};

/// Default delay before a requested restart, in seconds
fn default_restart_delay_secs() -> u64 {
    5
}

/// Runtime configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Worker threads; 0 uses the tokio default, 1 runs on the current thread
    #[serde(default)]
    pub worker_threads: usize,

    /// Seconds to wait before rebuilding after a lost control channel
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            worker_threads: 0,
            restart_delay_secs: default_restart_delay_secs(),
        }
    }
}
