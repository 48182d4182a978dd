//! SOCKS5 method negotiation
//!
//! Only "no authentication" is offered. A client that does not list it gets
//! `05 FF` and the session ends.

use super::consts::*;
use crate::error::Socks5Error;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read the client greeting and answer it
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
pub async fn negotiate<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;

    let version = header[0];
    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version).into());
    }

    let mut methods = vec![0u8; header[1] as usize];
    stream.read_exact(&mut methods).await?;

    let selected = if methods.contains(&SOCKS5_AUTH_METHOD_NONE) {
        SOCKS5_AUTH_METHOD_NONE
    } else {
        SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE
    };

    stream.write_all(&[SOCKS5_VERSION, selected]).await?;
    stream.flush().await?;

    if selected == SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE {
        return Err(Socks5Error::NoAcceptableMethod.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_negotiate_no_auth() {
        let mut mock = Builder::new()
            .read(&[0x05, 0x02, 0x02, 0x00])
            .write(&[0x05, 0x00])
            .build();
        negotiate(&mut mock).await.unwrap();
    }

    #[tokio::test]
    async fn test_negotiate_rejects_other_version_without_reply() {
        let mut mock = Builder::new().read(&[0x04, 0x01]).build();
        let err = negotiate(&mut mock).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Socks5Error>(),
            Some(Socks5Error::UnsupportedVersion(4))
        ));
    }

    #[tokio::test]
    async fn test_negotiate_answers_ff_then_aborts() {
        let mut mock = Builder::new()
            .read(&[0x05, 0x01, 0x02])
            .write(&[0x05, 0xFF])
            .build();
        let err = negotiate(&mut mock).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Socks5Error>(),
            Some(Socks5Error::NoAcceptableMethod)
        ));
    }

    #[tokio::test]
    async fn test_negotiate_zero_methods_is_not_acceptable() {
        let mut mock = Builder::new()
            .read(&[0x05, 0x00])
            .write(&[0x05, 0xFF])
            .build();
        assert!(negotiate(&mut mock).await.is_err());
    }
}
