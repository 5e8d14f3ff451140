//! TLS client configuration for pinned upstream connections.
//!
//! The socket targets the pinned IP, but the handshake presents and verifies
//! the original hostname, so certificate validation still binds the
//! connection to the name the caller asked for.

use super::error::FetchError;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::sync::Arc;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Build a TLS connector that verifies upstream certificates against the
/// platform's root store.
pub fn create_tls_connector() -> Result<TlsConnector, anyhow::Error> {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    for err in native_certs.errors {
        debug!("Skipping unreadable native certificate: {}", err);
    }

    let (added, ignored) = root_store.add_parsable_certificates(native_certs.certs);
    debug!("Loaded {} root certificates ({} ignored)", added, ignored);

    if root_store.is_empty() {
        anyhow::bail!("No system root certificates found");
    }

    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth();

    // Upstream connections speak HTTP/1.1 only
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Identity to verify during the handshake: the original hostname or IP literal.
pub fn server_name(host: &str) -> Result<ServerName<'static>, FetchError> {
    ServerName::try_from(host.to_string())
        .map_err(|_| FetchError::Upstream(format!("invalid TLS server name '{host}'")))
}
