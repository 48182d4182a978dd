//! Configuration module for Pika
//!
//! This module provides configuration types and parsing for every mode.

mod modes;
mod runtime;
mod tcp;

pub use modes::{ControllerConfig, ExporterConfig, ModeConfig, Socks5Config};
pub use runtime::RuntimeConfig;
pub use tcp::TcpConfig;

use crate::error::PikaError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// TCP socket configuration for control channels
    #[serde(default)]
    pub tcp: TcpConfig,

    /// Controller mode
    #[serde(default)]
    pub controller: Option<ControllerConfig>,

    /// Exporter mode
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,

    /// SOCKS5 server mode
    #[serde(default)]
    pub socks5: Option<Socks5Config>,
}

impl Config {
    /// Replace whatever mode the file selected with `mode`
    pub fn with_mode(mut self, mode: ModeConfig) -> Self {
        self.controller = None;
        self.exporter = None;
        self.socks5 = None;
        match mode {
            ModeConfig::Controller(c) => self.controller = Some(c),
            ModeConfig::Exporter(e) => self.exporter = Some(e),
            ModeConfig::Socks5(s) => self.socks5 = Some(s),
        }
        self
    }

    /// The single configured mode
    pub fn mode(&self) -> Result<ModeConfig, PikaError> {
        let mut modes = Vec::with_capacity(1);
        if let Some(c) = &self.controller {
            modes.push(ModeConfig::Controller(c.clone()));
        }
        if let Some(e) = &self.exporter {
            modes.push(ModeConfig::Exporter(e.clone()));
        }
        if let Some(s) = &self.socks5 {
            modes.push(ModeConfig::Socks5(s.clone()));
        }

        match modes.len() {
            0 => Err(PikaError::Config(
                "no mode configured; add a [controller], [exporter] or [socks5] section"
                    .to_string(),
            )),
            1 => Ok(modes.remove(0)),
            n => Err(PikaError::Config(format!(
                "{} modes configured; exactly one of [controller], [exporter], [socks5] is allowed",
                n
            ))),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PikaError> {
        if self.runtime.restart_delay_secs == 0 {
            return Err(PikaError::Config(
                "runtime.restart_delay_secs must be greater than zero".to_string(),
            ));
        }
        if let ModeConfig::Controller(c) = self.mode()? {
            if c.keepalive_period_secs == 0 {
                return Err(PikaError::Config(
                    "controller.keepalive_period_secs must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}
