//! Local server for the reSOURCERY PWA.
//!
//! Serves the app's static files with cross-origin isolation headers and
//! exposes `GET /api/fetch?url=...`, a fetch relay that refuses to reach
//! loopback, private, link-local, multicast or reserved addresses.

pub mod config;
pub mod fetch;
pub mod metrics;
pub mod server;

pub use config::Config;
pub use server::ResourceryServer;
