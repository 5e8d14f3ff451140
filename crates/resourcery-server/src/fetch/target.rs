//! Parsed fetch targets.

use super::error::FetchError;
use url::Url;

/// An absolute http(s) URL the relay has been asked to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    url: Url,
}

impl FetchTarget {
    /// Parse the caller-supplied URL.
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FetchError::MissingParameter);
        }
        let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        Self::from_url(url)
    }

    fn from_url(url: Url) -> Result<Self, FetchError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(FetchError::MissingHostname);
        }
        Ok(Self { url })
    }

    /// Resolve a redirect `Location` against this target.
    ///
    /// Relative locations are joined to the current URL. Any failure is the
    /// upstream's fault, so it surfaces as a gateway error rather than a
    /// client error.
    pub fn follow(&self, location: &str) -> Result<Self, FetchError> {
        let next = self
            .url
            .join(location)
            .map_err(|e| FetchError::InvalidRedirect(format!("{location}: {e}")))?;
        Self::from_url(next).map_err(|e| FetchError::InvalidRedirect(e.to_string()))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Hostname without IPv6 brackets.
    pub fn host(&self) -> &str {
        let host = self.url.host_str().unwrap_or_default();
        host.strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host)
    }

    pub fn port(&self) -> u16 {
        // from_url only admits http and https, both of which have a default
        self.url.port_or_known_default().unwrap_or(80)
    }

    /// Value for the outgoing `Host` header: host plus any explicit non-default port.
    pub fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Origin-form request target (path and query, no fragment).
    pub fn request_target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

impl std::fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.url, f)
    }
}
