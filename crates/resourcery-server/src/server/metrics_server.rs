//! Prometheus scrape endpoint.

use super::network::create_reusable_listener;
use crate::fetch::{full_body, RelayBody};
use crate::metrics::collect_metrics;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::{debug, info};

static PROMETHEUS_TEXT: HeaderValue = HeaderValue::from_static("text/plain; version=0.0.4");

/// Serves `GET /metrics` on its own listener.
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = create_reusable_listener(self.addr)?;
        info!("Metrics listening on http://{}/metrics", self.addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                let service = service_fn(|req| async move { Ok::<_, Infallible>(handle(&req)) });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Metrics connection error: {}", e);
                }
            });
        }
    }
}

fn handle<B>(req: &Request<B>) -> Response<RelayBody> {
    if req.uri().path() != "/metrics" {
        let mut response = Response::new(full_body("Not Found\n"));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    }
    let mut response = Response::new(full_body(collect_metrics()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, PROMETHEUS_TEXT.clone());
    response
}
