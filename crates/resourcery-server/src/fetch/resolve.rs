//! Hostname validation and DNS pinning.
//!
//! A hostname is resolved exactly once per hop. The address chosen here is the
//! one the connector dials, so a second lookup can never swap in a different
//! (internal) address between validation and connection.

use super::classify::is_blocked;
use super::error::FetchError;
use async_trait::async_trait;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Source of DNS answers.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Return every address the hostname resolves to, across both families.
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// A vetted address plus the hostname it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedAddress {
    pub ip: IpAddr,
    /// Kept for TLS identity checks and the outgoing `Host` header
    pub hostname: String,
}

/// Validate a hostname and pin it to a single allowed address.
///
/// Fails closed: a hostname with even one blocked address is rejected, and
/// lookup errors are rejections.
pub async fn validate_and_resolve(
    resolver: &dyn Resolver,
    hostname: &str,
    port: u16,
) -> Result<PinnedAddress, FetchError> {
    let host = hostname.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(FetchError::MissingHostname);
    }

    let bare = host.trim_end_matches('.').to_ascii_lowercase();
    if bare == "localhost" || bare == "::1" {
        warn!("Rejected fetch to loopback name '{}'", host);
        return Err(FetchError::PrivateAddress {
            host: host.to_string(),
        });
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_blocked(&ip) {
            warn!("Rejected fetch to blocked address {}", ip);
            return Err(FetchError::PrivateAddress {
                host: host.to_string(),
            });
        }
        return Ok(PinnedAddress {
            ip,
            hostname: host.to_string(),
        });
    }

    let mut addrs = resolver
        .lookup(host, port)
        .await
        .map_err(|e| FetchError::Resolution {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

    if addrs.is_empty() {
        return Err(FetchError::Resolution {
            host: host.to_string(),
            reason: "no addresses returned".to_string(),
        });
    }

    if let Some(ip) = addrs.iter().find(|ip| is_blocked(ip)) {
        warn!("Rejected fetch to '{}': resolves to blocked address {}", host, ip);
        return Err(FetchError::PrivateAddress {
            host: host.to_string(),
        });
    }

    // Stable sort keeps resolver order within each family
    addrs.sort_by_key(|ip| ip.is_ipv6());
    let ip = addrs[0];
    debug!("Pinned '{}' to {} ({} candidates)", host, ip, addrs.len());

    Ok(PinnedAddress {
        ip,
        hostname: host.to_string(),
    })
}
