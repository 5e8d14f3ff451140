//! A single upstream hop: connect, send one GET, read the response head.

use super::connector::Connector;
use super::error::FetchError;
use super::resolve::PinnedAddress;
use super::target::FetchTarget;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::header::{ACCEPT, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION, USER_AGENT};
use hyper::header::HeaderValue;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::debug;

/// Aborts the hop's connection task when dropped, closing the socket.
#[derive(Debug)]
pub struct ConnectionGuard(AbortHandle);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Response head and body stream for one hop.
///
/// Owns the connection: dropping it releases the upstream socket.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub content_length: Option<u64>,
    pub location: Option<String>,
    pub body: Incoming,
    pub guard: ConnectionGuard,
}

/// Open a pinned connection and exchange one GET request.
///
/// Connect, handshake and the response head are each bounded by
/// `connect_timeout`; the body is left to the streamer's idle timeout.
pub async fn open(
    connector: &dyn Connector,
    target: &FetchTarget,
    pinned: &PinnedAddress,
    user_agent: &str,
    connect_timeout: Duration,
) -> Result<UpstreamResponse, FetchError> {
    let io = timeout(connect_timeout, connector.connect(target, pinned)).await??;

    let (mut sender, conn) = timeout(
        connect_timeout,
        hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(TokioIo::new(io)),
    )
    .await??;

    let host = target.host_header();
    let driver = tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!("Upstream connection to {} ended: {}", host, err);
        }
    });
    let guard = ConnectionGuard(driver.abort_handle());

    let request = Request::get(target.request_target())
        .header(HOST, target.host_header())
        .header(USER_AGENT, user_agent)
        .header(ACCEPT, "*/*")
        .header(CONNECTION, "close")
        .body(Empty::<Bytes>::new())
        .map_err(|e| FetchError::Upstream(format!("failed to build request: {e}")))?;

    let response = timeout(connect_timeout, sender.send_request(request)).await??;
    let (parts, body) = response.into_parts();

    let content_length = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let location = parts
        .headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    debug!(
        "{} answered {} (content-length: {:?})",
        target, parts.status, content_length
    );

    Ok(UpstreamResponse {
        status: parts.status,
        content_type: parts.headers.get(CONTENT_TYPE).cloned(),
        content_length,
        location,
        body,
        guard,
    })
}
