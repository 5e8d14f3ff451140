//! Response construction for the fetch relay.

use super::error::FetchError;
use crate::server::headers::{HeadersExt, NO_STORE, NO_STORE_MAX_AGE_0, RELAY_CSP};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_SECURITY_POLICY,
    CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS,
};
use hyper::{Response, StatusCode};
use std::convert::Infallible;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type for every response the server writes.
pub type RelayBody = http_body_util::combinators::UnsyncBoxBody<Bytes, BoxError>;

static JSON_UTF8: HeaderValue = HeaderValue::from_static("application/json; charset=utf-8");
static NOSNIFF: HeaderValue = HeaderValue::from_static("nosniff");
static ANY_ORIGIN: HeaderValue = HeaderValue::from_static("*");

/// Wrap bytes already in memory as a response body.
pub fn full_body(bytes: impl Into<Bytes>) -> RelayBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Empty response body.
pub fn empty_body() -> RelayBody {
    full_body(Bytes::new())
}

/// Headers carried by every successful relay response.
pub fn apply_relay_headers(headers: &mut HeaderMap) {
    headers.insert(CACHE_CONTROL, NO_STORE_MAX_AGE_0.clone());
    headers.insert(X_CONTENT_TYPE_OPTIONS, NOSNIFF.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, ANY_ORIGIN.clone());
    headers.insert(CONTENT_SECURITY_POLICY, RELAY_CSP.clone());
}

/// JSON error response: `{"error": "<message>"}`.
pub fn json_error(status: StatusCode, message: &str) -> Response<RelayBody> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response.set_header(&CONTENT_TYPE, &JSON_UTF8);
    response.set_header(&CACHE_CONTROL, &NO_STORE);
    response.set_header(&X_CONTENT_TYPE_OPTIONS, &NOSNIFF);
    response.set_header(&ACCESS_CONTROL_ALLOW_ORIGIN, &ANY_ORIGIN);
    response
}

/// Map a fetch failure to the caller-facing error response.
pub fn error_response(err: &FetchError) -> Response<RelayBody> {
    json_error(err.status(), &err.to_string())
}
