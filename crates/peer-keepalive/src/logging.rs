//! Logging setup and the log-based status presenter.

use crate::registry::{RegistrySnapshot, StatusObserver};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
#[must_use]
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "info,saorsa_peer_keepalive=debug"
    } else {
        "info"
    }
}

/// Initialize the global subscriber. `RUST_LOG` wins over `debug`.
pub fn init(debug: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Logs every registry snapshot as a small table.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl StatusObserver for LogObserver {
    fn on_snapshot(&self, snapshot: &RegistrySnapshot) {
        for line in render(snapshot) {
            info!("{line}");
        }
    }
}

fn render(snapshot: &RegistrySnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshot.peers.len() + 3);
    lines.push(format!(
        "{:<10} {:<10} {:<26} {}",
        "PEER", "CONNECTED", "LAST CONNECTED", "LATENCY"
    ));

    for (peer, status) in &snapshot.peers {
        lines.push(format!(
            "{:<10} {:<10} {:<26} {}",
            peer.short(),
            status.connected,
            status
                .last_connected_at
                .map_or_else(|| "-".to_string(), |at| at.to_rfc3339()),
            status
                .latency
                .map_or_else(|| "-".to_string(), |latency| format!("{latency:?}")),
        ));
    }

    lines.push(format!(
        "offline: {}, last connected at: {}",
        snapshot.offline,
        snapshot
            .last_connected_at
            .map_or_else(|| "never".to_string(), |at| at.to_rfc3339()),
    ));
    lines.push(format!(
        "average latency: {}",
        snapshot
            .average_latency
            .map_or_else(|| "-".to_string(), |latency| format!("{latency:?}")),
    ));
    lines
}
