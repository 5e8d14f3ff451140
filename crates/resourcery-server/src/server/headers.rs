//! Shared header injection.
//!
//! Static header names and values used across the server, plus the
//! cross-origin isolation step applied to every response. FFmpeg.wasm needs
//! `SharedArrayBuffer`, which browsers only expose to cross-origin isolated
//! documents.

use hyper::header::{HeaderName, HeaderValue};
use hyper::Response;

pub static CROSS_ORIGIN_EMBEDDER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-embedder-policy");
pub static CROSS_ORIGIN_OPENER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-opener-policy");

pub static REQUIRE_CORP: HeaderValue = HeaderValue::from_static("require-corp");
pub static SAME_ORIGIN: HeaderValue = HeaderValue::from_static("same-origin");
pub static NO_STORE: HeaderValue = HeaderValue::from_static("no-store");
pub static NO_STORE_MAX_AGE_0: HeaderValue = HeaderValue::from_static("no-store, max-age=0");
pub static RELAY_CSP: HeaderValue = HeaderValue::from_static("default-src 'none'; sandbox");
pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Extension trait for inserting headers into responses.
pub trait HeadersExt {
    /// Insert a header with a static name and value.
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);

    /// Insert a header with a dynamic string value.
    /// Returns false if the value couldn't be converted to a valid header value.
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool;
}

impl<B> HeadersExt for Response<B> {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers_mut().insert(name.clone(), value.clone());
    }

    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.headers_mut().insert(name.clone(), header_value);
                true
            }
            Err(_) => false,
        }
    }
}

/// Apply the cross-origin isolation headers to a response.
pub fn apply_isolation_headers<B>(response: &mut Response<B>) {
    response.set_header(&CROSS_ORIGIN_EMBEDDER_POLICY, &REQUIRE_CORP);
    response.set_header(&CROSS_ORIGIN_OPENER_POLICY, &SAME_ORIGIN);
}
