//! Control protocol type definitions
//!
//! Every message exchanged between controller and exporter is one fixed
//! 8-byte frame:
//!
//! ```text
//! +--------+----------+---------------------------+---------+
//! | OPCODE | RESERVED |          PAYLOAD          | PADDING |
//! +--------+----------+---------------------------+---------+
//! |   1    |  X'00'   | 4 (id) or 6 (ipv4 + port) |  0 - 2  |
//! +--------+----------+---------------------------+---------+
//! ```
//!
//! All integers are big-endian.

use std::fmt;
use std::net::SocketAddrV4;

/// Length of every control frame in bytes
pub const FRAME_LEN: usize = 8;

/// Keepalive, no payload
pub const OP_NOOP: u8 = 0x00;
/// Exporter asks the controller to open a reverse tunnel
pub const OP_BIND_REQUEST: u8 = 0x01;
/// Exporter claims a pending public client by id
pub const OP_CONNECT_WITH_ID: u8 = 0x02;
/// Controller announces a newly accepted public client
pub const OP_IS_REMOTE_REQUEST: u8 = 0x03;

/// Correlation id linking a reverse-tunnel client to the exporter's claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u32);

impl ClientId {
    /// Wrap a raw id
    pub const fn new(raw: u32) -> Self {
        ClientId(raw)
    }

    /// Raw value as carried on the wire
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for ClientId {
    fn from(raw: u32) -> Self {
        ClientId(raw)
    }
}

/// A decoded control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Keepalive
    Noop,
    /// Open a reverse tunnel listening on this endpoint
    BindRequest(SocketAddrV4),
    /// Pair this connection with the pending client
    ConnectWithId(ClientId),
    /// A public client is waiting under this id
    IsRemoteRequest(ClientId),
    /// Opcode this implementation does not know; ignored by both sides
    Unknown(u8),
}

impl Frame {
    /// Opcode byte of this frame
    pub fn opcode(&self) -> u8 {
        match self {
            Frame::Noop => OP_NOOP,
            Frame::BindRequest(_) => OP_BIND_REQUEST,
            Frame::ConnectWithId(_) => OP_CONNECT_WITH_ID,
            Frame::IsRemoteRequest(_) => OP_IS_REMOTE_REQUEST,
            Frame::Unknown(op) => *op,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Noop => write!(f, "Noop"),
            Frame::BindRequest(addr) => write!(f, "BindRequest({})", addr),
            Frame::ConnectWithId(id) => write!(f, "ConnectWithId({})", id),
            Frame::IsRemoteRequest(id) => write!(f, "IsRemoteRequest({})", id),
            Frame::Unknown(op) => write!(f, "Unknown({:#04x})", op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_opcodes() {
        assert_eq!(Frame::Noop.opcode(), 0x00);
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 9000);
        assert_eq!(Frame::BindRequest(addr).opcode(), 0x01);
        assert_eq!(Frame::ConnectWithId(ClientId::new(1)).opcode(), 0x02);
        assert_eq!(Frame::IsRemoteRequest(ClientId::new(1)).opcode(), 0x03);
        assert_eq!(Frame::Unknown(0x7f).opcode(), 0x7f);
    }

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId::new(0xab).to_string(), "0x000000ab");
        assert_eq!(ClientId::from(0xdeadbeef).get(), 0xdeadbeef);
    }

    #[test]
    fn test_frame_display() {
        let addr = SocketAddrV4::new(Ipv4Addr::new(0, 0, 0, 0), 9000);
        assert_eq!(Frame::BindRequest(addr).to_string(), "BindRequest(0.0.0.0:9000)");
        assert_eq!(Frame::Unknown(0x42).to_string(), "Unknown(0x42)");
    }
}
