//! Error types for the fetch relay.
//!
//! Every variant maps to the HTTP status reported to the caller:
//! - Client input errors (missing parameter, bad URL, unsupported scheme) → 400
//! - Policy rejections (target resolves to a disallowed address) → 403
//! - Oversized payloads → 413
//! - Upstream failures (connect, TLS, read, redirects) → 502, or the mirrored
//!   upstream status for 4xx/5xx responses

use hyper::StatusCode;
use thiserror::Error;

/// Reason a fetch was refused or failed before the response was committed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Missing url parameter")]
    MissingParameter,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Only HTTP(S) URLs are supported")]
    UnsupportedScheme(String),

    #[error("Missing hostname")]
    MissingHostname,

    #[error("Private network addresses are not allowed")]
    PrivateAddress { host: String },

    #[error("Could not resolve hostname")]
    Resolution { host: String, reason: String },

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream responded with {status}")]
    UpstreamStatus { status: StatusCode },

    #[error("Redirect response is missing a Location header")]
    MissingLocation,

    #[error("Invalid redirect target: {0}")]
    InvalidRedirect(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Response body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
}

impl FetchError {
    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            FetchError::MissingParameter
            | FetchError::InvalidUrl(_)
            | FetchError::UnsupportedScheme(_)
            | FetchError::MissingHostname => StatusCode::BAD_REQUEST,
            FetchError::PrivateAddress { .. } => StatusCode::FORBIDDEN,
            FetchError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            FetchError::UpstreamStatus { status }
                if status.is_client_error() || status.is_server_error() =>
            {
                *status
            }
            FetchError::Resolution { .. }
            | FetchError::Upstream(_)
            | FetchError::Timeout
            | FetchError::UpstreamStatus { .. }
            | FetchError::MissingLocation
            | FetchError::InvalidRedirect(_)
            | FetchError::TooManyRedirects => StatusCode::BAD_GATEWAY,
        }
    }

    /// Metric label for the failure class.
    ///
    /// Mirrored upstream statuses always count as upstream failures, whatever
    /// the status code they carry.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::MissingParameter
            | FetchError::InvalidUrl(_)
            | FetchError::UnsupportedScheme(_)
            | FetchError::MissingHostname => "client_error",
            FetchError::PrivateAddress { .. } => "policy_rejection",
            FetchError::PayloadTooLarge { .. } => "too_large",
            FetchError::Resolution { .. }
            | FetchError::Upstream(_)
            | FetchError::Timeout
            | FetchError::UpstreamStatus { .. }
            | FetchError::MissingLocation
            | FetchError::InvalidRedirect(_)
            | FetchError::TooManyRedirects => "upstream_failure",
        }
    }
}

impl From<hyper::Error> for FetchError {
    fn from(err: hyper::Error) -> Self {
        FetchError::Upstream(err.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Upstream(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for FetchError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        FetchError::Timeout
    }
}

/// Failure after the response headers have been committed to the caller.
///
/// These never reach the caller as a payload; hyper aborts the connection.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("upstream body stalled for more than {0:?}")]
    Idle(std::time::Duration),

    #[error("upstream body exceeded the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("upstream body read failed: {0}")]
    Read(#[from] hyper::Error),
}
