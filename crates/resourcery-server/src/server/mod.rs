//! HTTP front end.
//!
//! # Module Structure
//!
//! - `listener` - ResourceryServer struct and accept loop
//! - `router` - `/api/fetch` vs static dispatch
//! - `static_files` - Static file responder
//! - `headers` - Shared header injection (cross-origin isolation)
//! - `metrics_server` - Prometheus scrape endpoint
//! - `network` - Reusable TCP listener

pub mod headers;
mod listener;
mod metrics_server;
mod network;
mod router;
mod static_files;

pub use listener::ResourceryServer;
pub use metrics_server::MetricsServer;
pub use network::create_reusable_listener;
pub use router::{route_request, FETCH_PATH};
pub use static_files::StaticFiles;
