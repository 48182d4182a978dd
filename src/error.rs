//! Error types for Pika
//!
//! This module defines the custom error types used throughout the application.

use std::io;
use thiserror::Error;

/// Main error type for Pika operations
#[derive(Error, Debug)]
pub enum PikaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Control protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A `ConnectWithId` referenced a client that is not pending
    #[error("No pending client with id {0:#010x}")]
    Lookup(u32),
}

/// SOCKS5 specific errors
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Invalid domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Target connection failed, reply already sent
    #[error("Failed to reach target {target}: {source}")]
    TargetUnreachable {
        /// Requested target
        target: String,
        /// Underlying connect error
        #[source]
        source: io::Error,
    },
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl From<&io::Error> for Socks5ReplyCode {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NetworkUnreachable => Socks5ReplyCode::NetworkUnreachable,
            io::ErrorKind::HostUnreachable => Socks5ReplyCode::HostUnreachable,
            io::ErrorKind::ConnectionRefused => Socks5ReplyCode::ConnectionRefused,
            io::ErrorKind::TimedOut => Socks5ReplyCode::TtlExpired,
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks5_reply_code_to_u8() {
        assert_eq!(u8::from(Socks5ReplyCode::Succeeded), 0x00);
        assert_eq!(u8::from(Socks5ReplyCode::GeneralFailure), 0x01);
        assert_eq!(u8::from(Socks5ReplyCode::NetworkUnreachable), 0x03);
        assert_eq!(u8::from(Socks5ReplyCode::HostUnreachable), 0x04);
        assert_eq!(u8::from(Socks5ReplyCode::ConnectionRefused), 0x05);
        assert_eq!(u8::from(Socks5ReplyCode::TtlExpired), 0x06);
        assert_eq!(u8::from(Socks5ReplyCode::AddressTypeNotSupported), 0x08);
    }

    #[test]
    fn test_socks5_reply_code_from_io_error() {
        let cases = [
            (io::ErrorKind::NetworkUnreachable, Socks5ReplyCode::NetworkUnreachable),
            (io::ErrorKind::HostUnreachable, Socks5ReplyCode::HostUnreachable),
            (io::ErrorKind::ConnectionRefused, Socks5ReplyCode::ConnectionRefused),
            (io::ErrorKind::TimedOut, Socks5ReplyCode::TtlExpired),
            (io::ErrorKind::PermissionDenied, Socks5ReplyCode::GeneralFailure),
            (io::ErrorKind::Other, Socks5ReplyCode::GeneralFailure),
        ];

        for (kind, expected) in cases {
            let err = io::Error::new(kind, "connect failed");
            assert_eq!(Socks5ReplyCode::from(&err), expected, "kind {:?}", kind);
        }
    }

    #[test]
    fn test_pika_error_display() {
        let err = PikaError::Config("no mode".to_string());
        assert_eq!(format!("{}", err), "Configuration error: no mode");

        let err = PikaError::Protocol("short frame".to_string());
        assert_eq!(format!("{}", err), "Protocol error: short frame");

        let err = PikaError::Lookup(0xdeadbeef);
        assert_eq!(format!("{}", err), "No pending client with id 0xdeadbeef");
    }

    #[test]
    fn test_socks5_error_display() {
        let err = Socks5Error::UnsupportedVersion(4);
        assert_eq!(format!("{}", err), "Unsupported SOCKS version: 4");

        let err = Socks5Error::CommandNotSupported(0x02);
        assert_eq!(format!("{}", err), "Command not supported: 2");

        let err = Socks5Error::AddressTypeNotSupported(0x04);
        assert_eq!(format!("{}", err), "Address type not supported: 4");

        let err = Socks5Error::TargetUnreachable {
            target: "127.0.0.1:9".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(
            format!("{}", err),
            "Failed to reach target 127.0.0.1:9: refused"
        );
    }
}
