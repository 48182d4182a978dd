//! SOCKS5 reply builder

use crate::error::Socks5ReplyCode;
use crate::socks::consts::*;
use anyhow::Result;
use bytes::BufMut;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Encode a reply carrying an IPv4 bound address
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   |    4     |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub fn encode_reply(code: Socks5ReplyCode, bound: SocketAddrV4) -> [u8; SOCKS5_IPV4_REPLY_LEN] {
    let mut reply = [0u8; SOCKS5_IPV4_REPLY_LEN];
    let mut buf = &mut reply[..];
    buf.put_u8(SOCKS5_VERSION);
    buf.put_u8(code.into());
    buf.put_u8(SOCKS5_RESERVED);
    buf.put_u8(SOCKS5_ADDR_TYPE_IPV4);
    buf.put_slice(&bound.ip().octets());
    buf.put_u16(bound.port());
    reply
}

/// Write a reply and flush it
pub async fn send_reply<S>(stream: &mut S, code: Socks5ReplyCode, bound: SocketAddrV4) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&encode_reply(code, bound)).await?;
    stream.flush().await?;
    Ok(())
}

/// Report a successful connect with the target's address
pub async fn send_success<S>(stream: &mut S, target: SocketAddrV4) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, Socks5ReplyCode::Succeeded, target).await
}

/// Report a failed connect, mapping the error to a reply code
pub async fn send_failure<S>(stream: &mut S, error: &io::Error) -> Result<Socks5ReplyCode>
where
    S: AsyncWrite + Unpin,
{
    let code = Socks5ReplyCode::from(error);
    send_reply(stream, code, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).await?;
    Ok(code)
}
