//! Configuration types for the reSOURCERY server.

mod fetch;
mod listen;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use fetch::FetchConfig;
pub use listen::{ListenConfig, MetricsConfig, StaticFilesConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub static_files: StaticFilesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        // The relay trusts its callers, so it must never be reachable off-host
        if !self.listen.host.is_loopback() {
            anyhow::bail!(
                "Listen address '{}' is not a loopback address. \
                 The server only binds to loopback interfaces",
                self.listen.host
            );
        }

        if self.fetch.connect_timeout_secs == 0 {
            anyhow::bail!("fetch.connect_timeout_secs must be greater than zero");
        }

        if self.fetch.idle_timeout_secs == 0 {
            anyhow::bail!("fetch.idle_timeout_secs must be greater than zero");
        }

        if self.fetch.max_body_bytes == 0 {
            anyhow::bail!("fetch.max_body_bytes must be greater than zero");
        }

        if self.fetch.user_agent.trim().is_empty() {
            anyhow::bail!("fetch.user_agent must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen.port, 50910);
        assert_eq!(config.listen.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.fetch.max_redirects, 5);
        assert_eq!(config.fetch.max_body_bytes, 2_147_483_648);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.port, 50910);
        assert_eq!(config.fetch.connect_timeout_secs, 15);
        assert_eq!(config.fetch.idle_timeout_secs, 60);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
listen:
  port: 8081
fetch:
  max_redirects: 2
  idle_timeout_secs: 5
static_files:
  root: /srv/app
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.port, 8081);
        assert_eq!(config.fetch.max_redirects, 2);
        assert_eq!(config.fetch.idle_timeout_secs, 5);
        assert_eq!(config.fetch.connect_timeout_secs, 15);
        assert_eq!(config.static_files.root.to_str(), Some("/srv/app"));
    }

    #[test]
    fn test_rejects_public_listen_host() {
        let mut config = Config::default();
        config.listen.host = "0.0.0.0".parse().unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("loopback"));
    }

    #[test]
    fn test_accepts_ipv6_loopback() {
        let mut config = Config::default();
        config.listen.host = "::1".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = Config::default();
        config.fetch.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen:\n  port: 9000\nmetrics:\n  enabled: true").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.listen.port, 9000);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen:\n  host: 10.0.0.1").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
