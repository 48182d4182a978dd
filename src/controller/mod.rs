//! Controller side of the reverse proxy
//!
//! Exposes [`Controller`] plus the pieces it is built from: reverse tunnels
//! and the registries that park public clients until an exporter claims them.

mod controller;
mod registry;
mod tunnel;

pub use controller::Controller;
pub use registry::{PendingClients, TunnelDirectory, TunnelRegistration};
pub use tunnel::{monitor_control_channel, ReverseTunnel};
