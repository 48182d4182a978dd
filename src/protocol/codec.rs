//! Control frame codec
//!
//! Encodes and decodes the fixed 8-byte frames and provides the async
//! helpers used on control channels.

use super::types::{
    ClientId, Frame, FRAME_LEN, OP_BIND_REQUEST, OP_CONNECT_WITH_ID, OP_IS_REMOTE_REQUEST,
    OP_NOOP,
};
use crate::error::PikaError;
use anyhow::{Context, Result};
use bytes::{Buf, BufMut};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

const RESERVED: u8 = 0x00;

impl Frame {
    /// Encode into the 8-byte wire form; unused bytes are zero
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        let mut buf = &mut out[..];
        buf.put_u8(self.opcode());
        buf.put_u8(RESERVED);
        match self {
            Frame::BindRequest(addr) => {
                buf.put_u32(u32::from(*addr.ip()));
                buf.put_u16(addr.port());
            }
            Frame::ConnectWithId(id) | Frame::IsRemoteRequest(id) => {
                buf.put_u32(id.get());
            }
            Frame::Noop | Frame::Unknown(_) => {}
        }
        out
    }

    /// Decode a frame, rejecting buffers that are not exactly 8 bytes
    pub fn decode(raw: &[u8]) -> Result<Frame, PikaError> {
        if raw.len() != FRAME_LEN {
            return Err(PikaError::Protocol(format!(
                "control frame must be {} bytes, got {}",
                FRAME_LEN,
                raw.len()
            )));
        }

        let mut buf = raw;
        let opcode = buf.get_u8();
        let _reserved = buf.get_u8();

        let frame = match opcode {
            OP_NOOP => Frame::Noop,
            OP_BIND_REQUEST => {
                let ip = Ipv4Addr::from(buf.get_u32());
                let port = buf.get_u16();
                Frame::BindRequest(SocketAddrV4::new(ip, port))
            }
            OP_CONNECT_WITH_ID => Frame::ConnectWithId(ClientId::new(buf.get_u32())),
            OP_IS_REMOTE_REQUEST => Frame::IsRemoteRequest(ClientId::new(buf.get_u32())),
            other => Frame::Unknown(other),
        };

        Ok(frame)
    }
}

/// Read exactly one frame from the stream
///
/// A short read (peer closed mid-frame) is an error.
pub async fn read_frame<T: AsyncRead + Unpin>(conn: &mut T) -> Result<Frame> {
    let mut buf = [0u8; FRAME_LEN];
    conn.read_exact(&mut buf)
        .await
        .with_context(|| "Failed to read control frame")?;
    let frame = Frame::decode(&buf)?;
    trace!("Read frame {}", frame);
    Ok(frame)
}

/// Write one frame to the stream and flush it
pub async fn write_frame<T: AsyncWrite + Unpin>(conn: &mut T, frame: &Frame) -> Result<()> {
    conn.write_all(&frame.encode())
        .await
        .with_context(|| format!("Failed to write {}", frame))?;
    conn.flush()
        .await
        .with_context(|| format!("Failed to flush {}", frame))?;
    trace!("Wrote frame {}", frame);
    Ok(())
}
