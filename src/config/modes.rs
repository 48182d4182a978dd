//! Per-mode configuration types
//!
//! Exactly one of these sections selects what the process runs.

use serde::{Deserialize, Serialize};

/// Default keepalive period of a reverse tunnel's control channel
fn default_keepalive_period_secs() -> u64 {
    10
}

/// Controller configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Control listen endpoint (e.g., ":7000")
    pub listen: String,

    /// Seconds between keepalive frames on each reverse tunnel
    #[serde(default = "default_keepalive_period_secs")]
    pub keepalive_period_secs: u64,
}

impl ControllerConfig {
    /// Controller listening on `listen` with default settings
    pub fn new(listen: impl Into<String>) -> Self {
        ControllerConfig {
            listen: listen.into(),
            keepalive_period_secs: default_keepalive_period_secs(),
        }
    }
}

/// Exporter configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Local service to expose (e.g., "127.0.0.1:22")
    pub export: String,

    /// Controller control endpoint (e.g., "public.example.com:7000")
    pub controller: String,

    /// Endpoint the controller should open the reverse tunnel on (e.g., ":9000")
    pub bind: String,
}

/// SOCKS5 server configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Socks5Config {
    /// Listen endpoint (e.g., "127.0.0.1:1080")
    pub listen: String,
}

/// The selected operating mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeConfig {
    /// Run a controller
    Controller(ControllerConfig),
    /// Run an exporter
    Exporter(ExporterConfig),
    /// Run a SOCKS5 server
    Socks5(Socks5Config),
}

impl ModeConfig {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ModeConfig::Controller(_) => "controller",
            ModeConfig::Exporter(_) => "exporter",
            ModeConfig::Socks5(_) => "socks5",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_config_default_keepalive() {
        let config: ControllerConfig = toml::from_str(r#"listen = ":7000""#).unwrap();
        assert_eq!(config.keepalive_period_secs, 10);
        assert_eq!(config, ControllerConfig::new(":7000"));
    }

    #[test]
    fn test_exporter_config_requires_all_endpoints() {
        let result: Result<ExporterConfig, _> = toml::from_str(r#"export = "127.0.0.1:22""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_mode_names() {
        let socks = ModeConfig::Socks5(Socks5Config {
            listen: ":1080".to_string(),
        });
        assert_eq!(socks.name(), "socks5");
        assert_eq!(
            ModeConfig::Controller(ControllerConfig::new(":7000")).name(),
            "controller"
        );
    }
}
