//! # Pika - TCP Reverse Proxy and SOCKS5 Server
//!
//! Pika exposes a TCP service that sits behind NAT or a firewall. An
//! exporter running next to the service dials out to a public controller,
//! asks it to listen on a public endpoint, and is told about every public
//! client that connects there. The exporter then opens a fresh connection
//! per client and the controller pairs the two. Pika also ships a small
//! standalone SOCKS5 server.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pika::config::load_config;
//! use pika::app::build_service;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("pika.toml")?;
//!     let service = build_service(&config)?;
//!     let outcome = service.run(CancellationToken::new()).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Public client -> Controller (bind endpoint) <-> Exporter -> Local service
//!                       ^ control channel (8-byte frames) ^
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod app;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod exporter;
pub mod protocol;
pub mod service;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use app::{build_runtime, build_service};
pub use config::{load_config, Config};
pub use error::{PikaError, Socks5Error};
pub use service::{RestartSignal, RunOutcome, Service};

/// Version of the Pika library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pika");
    }
}
