//! SSRF-hardened fetch relay.
//!
//! Serves `GET /api/fetch?url=...`: fetches a remote http(s) resource on
//! behalf of the browser app and streams it back, refusing any target that
//! is, or resolves to, a loopback, private, link-local, multicast or reserved
//! address.
//!
//! # Module Structure
//!
//! - `classify` - Address classification
//! - `resolve` - Hostname validation and DNS pinning
//! - `connector` - Pinned TCP/TLS connections
//! - `tls` - rustls client configuration
//! - `upstream` - One request/response exchange per hop
//! - `relay` - Redirect-following orchestrator
//! - `stream` - Bounded streaming of the final body
//! - `response` - Relay response and JSON error construction
//! - `error` - Error taxonomy and status mapping

mod classify;
mod connector;
mod error;
mod relay;
mod resolve;
mod response;
mod stream;
mod target;
mod tls;
mod upstream;


pub use classify::is_blocked;
pub use connector::{BoxedIo, Connector, PinnedConnector, UpstreamIo};
pub use error::{FetchError, StreamError};
pub use relay::{FetchLimits, FetchRelay};
pub use resolve::{validate_and_resolve, PinnedAddress, Resolver, SystemResolver};
pub use response::{empty_body, error_response, full_body, json_error, BoxError, RelayBody};
pub use target::FetchTarget;
