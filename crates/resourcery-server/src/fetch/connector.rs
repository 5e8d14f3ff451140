//! Pinned upstream connections.
//!
//! The connector dials the pinned IP, never the hostname, so nothing between
//! validation and connection can re-resolve the name. For https the handshake
//! verifies the original hostname.

use super::error::FetchError;
use super::resolve::PinnedAddress;
use super::target::FetchTarget;
use super::tls::{create_tls_connector, server_name};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// Byte stream to an upstream server (plain TCP or TLS).
pub trait UpstreamIo: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> UpstreamIo for T {}

pub type BoxedIo = Box<dyn UpstreamIo>;

/// Opens the transport for one hop.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        target: &FetchTarget,
        pinned: &PinnedAddress,
    ) -> Result<BoxedIo, FetchError>;
}

/// Connector dialing the pinned address over TCP, with rustls for https.
pub struct PinnedConnector {
    tls: Option<TlsConnector>,
}

impl PinnedConnector {
    pub fn new() -> Self {
        let tls = match create_tls_connector() {
            Ok(tls) => Some(tls),
            Err(e) => {
                warn!("HTTPS fetches disabled: {}", e);
                None
            }
        };
        Self { tls }
    }
}

impl Default for PinnedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for PinnedConnector {
    async fn connect(
        &self,
        target: &FetchTarget,
        pinned: &PinnedAddress,
    ) -> Result<BoxedIo, FetchError> {
        let addr = SocketAddr::new(pinned.ip, target.port());
        debug!("Connecting to {} for '{}'", addr, pinned.hostname);

        let stream = TcpStream::connect(addr).await.map_err(|e| {
            FetchError::Upstream(format!("connection to {addr} failed: {e}"))
        })?;
        stream.set_nodelay(true)?;

        if !target.is_https() {
            return Ok(Box::new(stream));
        }

        let tls = self
            .tls
            .as_ref()
            .ok_or_else(|| FetchError::Upstream("no trusted root certificates".to_string()))?;
        let name = server_name(&pinned.hostname)?;
        let stream = tls.connect(name, stream).await.map_err(|e| {
            FetchError::Upstream(format!("TLS handshake with '{}' failed: {e}", pinned.hostname))
        })?;
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn pinned_to_loopback(hostname: &str) -> PinnedAddress {
        PinnedAddress {
            ip: "127.0.0.1".parse().unwrap(),
            hostname: hostname.to_string(),
        }
    }

    #[tokio::test]
    async fn test_dials_pinned_address_without_lookup() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // media.example never resolves; the dial must use the pinned IP
        let target = FetchTarget::parse(&format!("http://media.example:{port}/clip")).unwrap();
        let pinned = pinned_to_loopback("media.example");

        let accept = tokio::spawn(async move {
            let (mut stream, peer) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            (peer, buf)
        });

        let mut io = PinnedConnector::new().connect(&target, &pinned).await.unwrap();
        io.write_all(b"ping").await.unwrap();

        let (peer, received) = accept.await.unwrap();
        assert!(peer.ip().is_loopback());
        assert_eq!(&received, b"ping");
    }

    #[tokio::test]
    async fn test_refused_connection_is_gateway_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = FetchTarget::parse(&format!("http://media.example:{port}/")).unwrap();

        let err = match PinnedConnector::new()
            .connect(&target, &pinned_to_loopback("media.example"))
            .await
        {
            Ok(_) => panic!("connection should be refused"),
            Err(e) => e,
        };
        assert!(matches!(err, FetchError::Upstream(_)));
        assert_eq!(err.status(), 502);
    }

    /// Plain TCP server that answers a TLS ClientHello with HTTP text.
    async fn plaintext_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                    .await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_https_against_plaintext_server_is_gateway_error() {
        let port = plaintext_server().await;
        let target = FetchTarget::parse(&format!("https://media.example:{port}/")).unwrap();

        let err = match PinnedConnector::new()
            .connect(&target, &pinned_to_loopback("media.example"))
            .await
        {
            Ok(_) => panic!("TLS handshake should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, FetchError::Upstream(_)));
        assert_eq!(err.status(), 502);
    }

    #[tokio::test]
    async fn test_https_without_roots_is_gateway_error() {
        let port = plaintext_server().await;
        let target = FetchTarget::parse(&format!("https://media.example:{port}/")).unwrap();
        let connector = PinnedConnector { tls: None };

        let err = match connector
            .connect(&target, &pinned_to_loopback("media.example"))
            .await
        {
            Ok(_) => panic!("https needs trusted roots"),
            Err(e) => e,
        };
        assert!(matches!(err, FetchError::Upstream(ref msg) if msg.contains("root certificates")));
        assert_eq!(err.status(), 502);
    }

    #[tokio::test]
    async fn test_plain_http_works_without_roots() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = FetchTarget::parse(&format!("http://media.example:{port}/")).unwrap();
        let connector = PinnedConnector { tls: None };

        let accept = tokio::spawn(async move { listener.accept().await.is_ok() });
        assert!(connector
            .connect(&target, &pinned_to_loopback("media.example"))
            .await
            .is_ok());
        assert!(accept.await.unwrap());
    }
}
