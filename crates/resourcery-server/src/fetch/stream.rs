//! Bounded, incremental delivery of an upstream body to the caller.

use super::error::{FetchError, StreamError};
use super::response::{apply_relay_headers, BoxError, RelayBody};
use super::upstream::{ConnectionGuard, UpstreamResponse};
use crate::metrics;
use bytes::Bytes;
use futures::stream;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Running byte count against the body ceiling.
#[derive(Debug, Clone, Copy)]
struct ByteBudget {
    sent: u64,
    limit: u64,
}

impl ByteBudget {
    fn new(limit: u64) -> Self {
        Self { sent: 0, limit }
    }

    /// Charge `len` bytes. Only frames that fit are counted as sent.
    fn admit(&mut self, len: usize) -> Result<(), StreamError> {
        let sent = self.sent.saturating_add(len as u64);
        if sent > self.limit {
            return Err(StreamError::TooLarge { limit: self.limit });
        }
        self.sent = sent;
        metrics::record_bytes_streamed(len);
        Ok(())
    }
}

struct BodyState {
    body: Incoming,
    _guard: ConnectionGuard,
    budget: ByteBudget,
    idle: Duration,
}

/// Turn a 2xx upstream response into the caller's response.
///
/// A declared length over `limit` is refused before any byte moves. The body
/// is then copied frame by frame; the byte count is enforced independently of
/// the declared length, and a read gap longer than `idle` ends the transfer.
/// Mid-stream failures surface as body errors, which make hyper drop the
/// caller's connection since the status line is already committed.
pub fn relay_body(
    upstream: UpstreamResponse,
    limit: u64,
    idle: Duration,
) -> Result<Response<RelayBody>, FetchError> {
    if let Some(len) = upstream.content_length {
        if len > limit {
            return Err(FetchError::PayloadTooLarge { limit });
        }
    }

    let state = BodyState {
        body: upstream.body,
        _guard: upstream.guard,
        budget: ByteBudget::new(limit),
        idle,
    };

    let frames = stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        match timeout(state.idle, state.body.frame()).await {
            Err(_) => {
                debug!(
                    "Upstream body idle for {:?} after {} bytes",
                    state.idle, state.budget.sent
                );
                Some((Err(StreamError::Idle(state.idle)), None))
            }
            Ok(None) => {
                debug!("Upstream body complete ({} bytes)", state.budget.sent);
                None
            }
            Ok(Some(Err(e))) => Some((Err(StreamError::Read(e)), None)),
            Ok(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    if let Err(e) = state.budget.admit(data.len()) {
                        return Some((Err(e), None));
                    }
                }
                Some((Ok::<Frame<Bytes>, StreamError>(frame), Some(state)))
            }
        }
    });

    let body = StreamBody::new(frames)
        .map_err(|e| -> BoxError { Box::new(e) })
        .boxed_unsync();

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Some(content_type) = upstream.content_type {
        headers.insert(CONTENT_TYPE, content_type);
    }
    if let Some(len) = upstream.content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    apply_relay_headers(headers);

    Ok(response)
}
