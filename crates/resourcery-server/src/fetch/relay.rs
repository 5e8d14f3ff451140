//! Redirect-following orchestrator.
//!
//! Each hop runs `validate → connect → inspect`. Redirects are followed by
//! hand so every `Location` goes back through validation before anything is
//! dialed; an HTTP client's automatic redirect handling would skip that.

use super::connector::{Connector, PinnedConnector};
use super::error::FetchError;
use super::resolve::{validate_and_resolve, Resolver, SystemResolver};
use super::response::RelayBody;
use super::stream::relay_body;
use super::target::FetchTarget;
use super::upstream;
use crate::config::FetchConfig;
use crate::metrics;
use hyper::Response;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Immutable limits for every fetch, built once at startup.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_redirects: u32,
    pub max_body_bytes: u64,
    pub user_agent: String,
}

impl From<&FetchConfig> for FetchLimits {
    fn from(config: &FetchConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            max_redirects: config.max_redirects,
            max_body_bytes: config.max_body_bytes,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

/// The validated-fetch relay.
pub struct FetchRelay {
    limits: FetchLimits,
    resolver: Arc<dyn Resolver>,
    connector: Arc<dyn Connector>,
}

impl FetchRelay {
    /// Relay using the system resolver and a pinned TCP/TLS connector.
    pub fn new(limits: FetchLimits) -> Self {
        Self::with_parts(limits, Arc::new(SystemResolver), Arc::new(PinnedConnector::new()))
    }

    pub fn with_parts(
        limits: FetchLimits,
        resolver: Arc<dyn Resolver>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            limits,
            resolver,
            connector,
        }
    }

    pub fn limits(&self) -> &FetchLimits {
        &self.limits
    }

    /// Fetch `raw_url` and return the streaming response for the caller.
    pub async fn fetch(&self, raw_url: &str) -> Result<Response<RelayBody>, FetchError> {
        let result = self.fetch_inner(raw_url).await;
        match &result {
            Ok(_) => metrics::record_fetch("ok"),
            Err(e) => metrics::record_fetch(e.kind()),
        }
        result
    }

    async fn fetch_inner(&self, raw_url: &str) -> Result<Response<RelayBody>, FetchError> {
        let mut target = FetchTarget::parse(raw_url)?;
        let mut redirects = 0u32;

        loop {
            let pinned = timeout(
                self.limits.connect_timeout,
                validate_and_resolve(self.resolver.as_ref(), target.host(), target.port()),
            )
            .await
            .map_err(|_| FetchError::Resolution {
                host: target.host().to_string(),
                reason: "lookup timed out".to_string(),
            })??;

            let hop = upstream::open(
                self.connector.as_ref(),
                &target,
                &pinned,
                &self.limits.user_agent,
                self.limits.connect_timeout,
            )
            .await
            .inspect_err(|e| warn!("Fetch of {} via {} failed: {}", target, pinned.ip, e))?;

            if hop.status.is_redirection() {
                let location = hop.location.clone().ok_or(FetchError::MissingLocation)?;
                // Close this hop before dialing the next one
                drop(hop);

                if redirects >= self.limits.max_redirects {
                    warn!("Giving up on {} after {} redirects", raw_url, redirects);
                    return Err(FetchError::TooManyRedirects);
                }
                redirects += 1;
                metrics::record_redirect();

                let next = target.follow(&location)?;
                debug!(
                    "Redirect {} of {}: {} -> {}",
                    redirects, self.limits.max_redirects, target, next
                );
                target = next;
                continue;
            }

            if !hop.status.is_success() {
                debug!("{} answered {}", target, hop.status);
                return Err(FetchError::UpstreamStatus { status: hop.status });
            }

            info!("Relaying {} ({} redirects)", target, redirects);
            return relay_body(hop, self.limits.max_body_bytes, self.limits.idle_timeout);
        }
    }
}
