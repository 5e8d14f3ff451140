//! ResourceryServer struct and main run loop.
//!
//! Holds the immutable state shared by every connection and runs the accept
//! loop: one task per inbound connection, each serving HTTP/1.1 requests.

use super::metrics_server::MetricsServer;
use super::network::create_reusable_listener;
use super::router::route_request;
use super::static_files::StaticFiles;
use crate::config::Config;
use crate::fetch::{FetchLimits, FetchRelay, RelayBody};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// The local PWA server: static files plus the fetch relay.
pub struct ResourceryServer {
    config: Arc<Config>,
    relay: FetchRelay,
    static_files: StaticFiles,
}

impl ResourceryServer {
    /// Create a server from configuration.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let relay = FetchRelay::new(FetchLimits::from(&config.fetch));
        Self::with_relay(config, relay)
    }

    /// Create a server around an existing relay.
    pub fn with_relay(config: Config, relay: FetchRelay) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let static_files = StaticFiles::new(&config.static_files.root)?;
        Ok(Self {
            config: Arc::new(config),
            relay,
            static_files,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.config.listen.socket_addr();
        let listener = create_reusable_listener(addr)
            .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))?;

        if self.config.metrics.enabled {
            let metrics_addr = SocketAddr::new(self.config.listen.host, self.config.metrics.port);
            tokio::spawn(async move {
                if let Err(e) = MetricsServer::new(metrics_addr).run().await {
                    error!("Metrics server failed: {}", e);
                }
            });
        }

        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let addr = listener.local_addr()?;
        info!("reSOURCERY server running at http://{}/", addr);
        info!("Serving files from: {}", self.static_files.root().display());
        info!(
            "Fetch relay at {}: max {} redirects, {} byte ceiling, idle timeout {:?}",
            super::router::FETCH_PATH,
            self.relay.limits().max_redirects,
            self.relay.limits().max_body_bytes,
            self.relay.limits().idle_timeout
        );

        let server = Arc::new(self);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Includes callers hanging up mid-stream and abandoned relays
                    debug!("Connection from {} closed with error: {}", remote_addr, err);
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: hyper::Request<hyper::body::Incoming>,
    ) -> Result<hyper::Response<RelayBody>, Infallible> {
        debug!("{} {}", req.method(), req.uri().path());
        Ok(route_request(&self.relay, &self.static_files, req).await)
    }
}
