//! SOCKS5 request parser

use crate::error::Socks5Error;
use crate::socks::consts::*;
use crate::socks::types::TargetAddr;
use anyhow::{Context, Result};
use std::net::Ipv4Addr;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Parse a CONNECT request from the stream
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// Every rejection happens before any reply is written.
pub async fn parse_request<S>(stream: &mut S) -> Result<TargetAddr>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .with_context(|| "Failed to read request header")?;

    let [version, command, _reserved, addr_type] = header;
    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version).into());
    }
    if command != SOCKS5_CMD_TCP_CONNECT {
        return Err(Socks5Error::CommandNotSupported(command).into());
    }

    let target = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut addr = [0u8; 4];
            stream.read_exact(&mut addr).await?;
            let port = stream.read_u16().await?;
            TargetAddr::ipv4(Ipv4Addr::from(addr), port)
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let len = stream.read_u8().await? as usize;
            let mut name = vec![0u8; len];
            stream.read_exact(&mut name).await?;
            let port = stream.read_u16().await?;

            let domain = String::from_utf8(name).map_err(|e| {
                Socks5Error::InvalidDomain(String::from_utf8_lossy(e.as_bytes()).into_owned())
            })?;
            if domain.is_empty() {
                return Err(Socks5Error::InvalidDomain(domain).into());
            }
            TargetAddr::domain(domain, port)
        }

        other => return Err(Socks5Error::AddressTypeNotSupported(other).into()),
    };

    tracing::debug!("Parsed SOCKS5 CONNECT to {}", target);
    Ok(target)
}
