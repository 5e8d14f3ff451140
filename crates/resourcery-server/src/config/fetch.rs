//! Fetch relay limits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Bound on DNS lookup, TCP connect, TLS handshake and response headers
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Longest allowed gap between body reads once headers have arrived
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_max_redirects() -> u32 {
    5
}

fn default_max_body_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_user_agent() -> String {
    format!("reSOURCERY/{}", env!("CARGO_PKG_VERSION"))
}
