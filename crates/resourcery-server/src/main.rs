use clap::Parser;
use resourcery_server::{Config, ResourceryServer};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "resourcery-server", version, about)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "RESOURCERY_PORT")]
    port: Option<u16>,

    /// Loopback address to bind
    #[arg(long, env = "RESOURCERY_HOST")]
    host: Option<IpAddr>,

    /// Directory of static files to serve
    #[arg(short, long, env = "RESOURCERY_ROOT")]
    root: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, env = "RESOURCERY_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<Config, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(root) = self.root {
            config.static_files.root = root;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let server = ResourceryServer::new(config)?;
    info!("Press Ctrl+C to stop");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Server stopped.");
            Ok(())
        }
    }
}
