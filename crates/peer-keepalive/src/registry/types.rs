//! Status types reported by supervisors and aggregated by the registry.

use crate::peer::PeerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Link status of a single peer.
///
/// `latency` is only present right after a successful liveness check and is
/// always cleared when the peer is marked disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Whether the last check found the peer alive
    pub connected: bool,
    /// When the peer was last confirmed alive
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Round trip of the last successful probe
    #[serde(default, with = "humantime_serde")]
    pub latency: Option<Duration>,
}

impl ConnectionStatus {
    /// A peer that has never been reached.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// A peer confirmed alive at `at` with the observed round trip.
    #[must_use]
    pub fn alive(at: DateTime<Utc>, latency: Duration) -> Self {
        Self {
            connected: true,
            last_connected_at: Some(at),
            latency: Some(latency),
        }
    }

    /// Same peer, now considered down. Keeps `last_connected_at`.
    #[must_use]
    pub fn disconnected(&self) -> Self {
        Self {
            connected: false,
            last_connected_at: self.last_connected_at,
            latency: None,
        }
    }
}

/// Global connectivity view recomputed on every report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Latest status of every tracked peer
    pub peers: BTreeMap<PeerId, ConnectionStatus>,
    /// True when no tracked peer is connected
    pub offline: bool,
    /// Most recent successful connection across all peers
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Mean latency over peers with a latency reading
    #[serde(default, with = "humantime_serde")]
    pub average_latency: Option<Duration>,
}

impl RegistrySnapshot {
    /// Aggregate a set of per-peer statuses.
    #[must_use]
    pub fn from_peers(peers: &BTreeMap<PeerId, ConnectionStatus>) -> Self {
        let offline = peers.values().all(|status| !status.connected);

        let last_connected_at = peers
            .values()
            .filter_map(|status| status.last_connected_at)
            .max();

        // Sum and count only entries that carry a reading.
        let readings: Vec<Duration> = peers.values().filter_map(|status| status.latency).collect();
        let average_latency = if readings.is_empty() {
            None
        } else {
            let total: Duration = readings.iter().sum();
            u32::try_from(readings.len())
                .ok()
                .map(|count| total / count)
        };

        Self {
            peers: peers.clone(),
            offline,
            last_connected_at,
            average_latency,
        }
    }

    /// Number of tracked peers currently connected.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.peers.values().filter(|status| status.connected).count()
    }
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self::from_peers(&BTreeMap::new())
    }
}
