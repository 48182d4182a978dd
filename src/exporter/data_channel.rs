//! Data channel handling
//!
//! One data channel per announced public client: connect to the exported
//! service, connect back to the controller, claim the client by id and
//! relay until both sides are done.

use crate::bridge::{Bridge, BridgeStats};
use crate::protocol::{write_frame, ClientId, Frame};
use crate::transport::{connect, resolve_endpoint, SocketOpts};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Build and run the bridge for client `id`
///
/// Failures abort only this attempt; the caller logs them.
pub async fn run_data_channel(
    export: String,
    controller: SocketAddr,
    id: ClientId,
    shutdown: CancellationToken,
) -> Result<BridgeStats> {
    let opts = SocketOpts::for_data_channel();

    let export_addr = resolve_endpoint(&export).await?;
    let local = connect(export_addr, &opts)
        .await
        .with_context(|| format!("Failed to reach exported service {}", export))?;

    let mut remote = connect(controller, &opts)
        .await
        .context("Failed to connect data channel")?;
    write_frame(&mut remote, &Frame::ConnectWithId(id)).await?;
    debug!(%id, "Data channel claimed client");

    Ok(Bridge::new(local, remote).start(shutdown).wait().await)
}
