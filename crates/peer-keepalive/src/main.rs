//! Peer keepalive binary.
//!
//! Resolves the peer list, supervises every peer over plain TCP and logs the
//! aggregate connectivity view until interrupted.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use anyhow::{Context, Result};
use clap::Parser;
use saorsa_peer_keepalive::{
    CeilingPolicy, ConnectionRegistry, KeepaliveConfig, PeerId, Supervision, TcpTransport,
    logging::{self, LogObserver},
    registry::start_status_server,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "saorsa-keepalive")]
#[command(about = "Keep peer links alive with periodic probes and fibonacci reconnect backoff")]
#[command(version)]
struct Cli {
    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Peer address to supervise (repeatable, overrides the peer list url)
    #[arg(long = "peer")]
    peers: Vec<PeerId>,

    /// Endpoint serving a JSON array of peer addresses
    #[arg(long)]
    peers_url: Option<String>,

    /// Keep only fetched addresses containing this marker
    #[arg(long)]
    transport_filter: Option<String>,

    /// Delay between liveness checks while connected (e.g. `1m`)
    #[arg(long, value_parser = humantime::parse_duration)]
    keepalive_interval: Option<Duration>,

    /// First backoff interval after a failure (e.g. `1s`)
    #[arg(long, value_parser = humantime::parse_duration)]
    backoff_seed: Option<Duration>,

    /// Timeout of a single connect attempt
    #[arg(long, value_parser = humantime::parse_duration)]
    connect_timeout: Option<Duration>,

    /// Cap backoff intervals at this value and retry forever
    #[arg(long, value_parser = humantime::parse_duration, conflicts_with = "max_retries")]
    soft_ceiling: Option<Duration>,

    /// Give up after this many reconnect retries
    #[arg(long)]
    max_retries: Option<u32>,

    /// Serve the status API on this port
    #[arg(long)]
    status_port: Option<u16>,

    /// Verbose logging for supervision cycles
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Result<KeepaliveConfig> {
        let mut config = match &self.config {
            Some(path) => KeepaliveConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => KeepaliveConfig::default(),
        };

        if !self.peers.is_empty() {
            config.peers.addresses = self.peers;
        }
        if let Some(url) = self.peers_url {
            config.peers.url = Some(url);
        }
        if let Some(filter) = self.transport_filter {
            config.peers.transport_filter = filter;
        }
        if let Some(interval) = self.keepalive_interval {
            config.supervisor.keepalive_interval = interval;
        }
        if let Some(seed) = self.backoff_seed {
            config.supervisor.backoff_seed = seed;
        }
        if let Some(timeout) = self.connect_timeout {
            config.supervisor.connect_timeout = timeout;
        }
        if let Some(max_interval) = self.soft_ceiling {
            config.supervisor.ceiling = CeilingPolicy::Soft { max_interval };
        }
        if let Some(max_retries) = self.max_retries {
            config.supervisor.ceiling = CeilingPolicy::Hard { max_retries };
        }
        if self.status_port.is_some() {
            config.status_port = self.status_port;
        }
        config.debug |= self.debug;

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    logging::init(config.debug);

    let peers = config
        .peers
        .resolve()
        .await
        .context("resolving peer list")?;

    let registry = ConnectionRegistry::new();
    registry.observe(Arc::new(LogObserver));

    if let Some(port) = config.status_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tokio::spawn(start_status_server(addr, registry.clone()));
    }

    let transport = Arc::new(TcpTransport::new(config.probe_timeout));
    let supervision = Supervision::start(config.supervisor, peers, transport.clone(), registry)
        .context("starting supervision")?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!(open_links = transport.open_links(), "Shutting down");
    supervision.shutdown().await;

    Ok(())
}
