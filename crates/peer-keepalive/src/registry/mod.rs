//! Connection Registry Module
//!
//! Aggregates the status reported by every peer supervisor into one global
//! connectivity view and pushes each recomputed view to observers.
//!
//! # Architecture
//!
//! ```text
//!   ┌────────────┐  ┌────────────┐  ┌────────────┐
//!   │ Supervisor │  │ Supervisor │  │ Supervisor │   one task per peer
//!   │  (peer A)  │  │  (peer B)  │  │  (peer C)  │
//!   └─────┬──────┘  └─────┬──────┘  └─────┬──────┘
//!         │ report        │ report        │ report
//!         ▼               ▼               ▼
//!   ┌─────────────────────────────────────────────┐
//!   │            ConnectionRegistry               │
//!   │  peer → status   (mutex-serialized)         │
//!   │  offline / last connected / avg latency     │
//!   └──────┬──────────────────┬───────────────────┘
//!          │ on_snapshot      │ watch
//!          ▼                  ▼
//!   StatusObserver(s)    GET /api/status
//! ```
//!
//! `report` is the only mutation. It replaces the peer's entry and recomputes
//! the snapshot under the peer map lock, then releases it and notifies
//! observers under a separate notify lock. Observers still see snapshots in
//! report order and may read the registry from their callback.

pub mod api;
mod types;

pub use api::{start_status_server, status_routes};
pub use types::{ConnectionStatus, RegistrySnapshot};

use crate::peer::PeerId;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// Receives every recomputed registry snapshot.
///
/// Called synchronously from `report`; implementations should return quickly.
/// They may call [`ConnectionRegistry::status`] and
/// [`ConnectionRegistry::snapshot`], but must not call `report` or `observe`.
pub trait StatusObserver: Send + Sync {
    /// A peer reported and the global view was recomputed.
    fn on_snapshot(&self, snapshot: &RegistrySnapshot);
}

impl<F> StatusObserver for F
where
    F: Fn(&RegistrySnapshot) + Send + Sync,
{
    fn on_snapshot(&self, snapshot: &RegistrySnapshot) {
        self(snapshot)
    }
}

struct RegistryInner {
    peers: Mutex<BTreeMap<PeerId, ConnectionStatus>>,
    notify: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn StatusObserver>>>,
    snapshot_tx: watch::Sender<RegistrySnapshot>,
}

/// Shared, cloneable registry handle.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(RegistrySnapshot::default());
        Self {
            inner: Arc::new(RegistryInner {
                peers: Mutex::new(BTreeMap::new()),
                notify: Mutex::new(()),
                observers: RwLock::new(Vec::new()),
                snapshot_tx,
            }),
        }
    }

    /// Register an observer for every future snapshot.
    pub fn observe(&self, observer: Arc<dyn StatusObserver>) {
        self.inner.observers.write().push(observer);
    }

    /// Watch channel that always holds the latest snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Replace the stored status for `peer` and publish the new view.
    pub fn report(&self, peer: PeerId, status: ConnectionStatus) -> RegistrySnapshot {
        // Taken before the peer map so publication follows report order.
        let _notify = self.inner.notify.lock();
        let snapshot = {
            let mut peers = self.inner.peers.lock();
            trace!(peer = %peer, connected = status.connected, "status reported");
            peers.insert(peer, status);
            RegistrySnapshot::from_peers(&peers)
        };

        self.inner.snapshot_tx.send_replace(snapshot.clone());
        for observer in self.inner.observers.read().iter() {
            observer.on_snapshot(&snapshot);
        }

        snapshot
    }

    /// Latest snapshot without waiting for a report.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Latest status of one peer, if it has reported.
    #[must_use]
    pub fn status(&self, peer: &PeerId) -> Option<ConnectionStatus> {
        self.inner.peers.lock().get(peer).copied()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("peers", &self.inner.peers.lock().len())
            .field("observers", &self.inner.observers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_report_replaces_previous_status() {
        let registry = ConnectionRegistry::new();
        let peer = PeerId::new("a");
        let at = Utc.timestamp_opt(100, 0).single().unwrap();

        registry.report(peer.clone(), ConnectionStatus::alive(at, Duration::from_millis(7)));
        let snapshot = registry.report(peer.clone(), ConnectionStatus::unreachable());

        assert_eq!(snapshot.peers.len(), 1);
        assert!(snapshot.offline);
        assert_eq!(registry.status(&peer), Some(ConnectionStatus::unreachable()));
    }

    #[test]
    fn test_observers_receive_every_snapshot() {
        let registry = ConnectionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        registry.observe(Arc::new(move |snapshot: &RegistrySnapshot| {
            assert!(!snapshot.peers.is_empty());
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        registry.report(PeerId::new("a"), ConnectionStatus::unreachable());
        registry.report(PeerId::new("b"), ConnectionStatus::unreachable());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_observer_can_read_registry_from_callback() {
        let registry = ConnectionRegistry::new();
        let peer = PeerId::new("a");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = registry.clone();
        let watched = peer.clone();
        let record = seen.clone();
        registry.observe(Arc::new(move |snapshot: &RegistrySnapshot| {
            let status = reader.status(&watched);
            assert_eq!(reader.snapshot().peers, snapshot.peers);
            record.lock().push(status);
        }));

        let at = Utc.timestamp_opt(100, 0).single().unwrap();
        let alive = ConnectionStatus::alive(at, Duration::from_millis(5));
        registry.report(peer.clone(), ConnectionStatus::unreachable());
        registry.report(peer, alive);

        assert_eq!(
            *seen.lock(),
            vec![Some(ConnectionStatus::unreachable()), Some(alive)]
        );
    }

    #[test]
    fn test_three_peer_aggregate() {
        let registry = ConnectionRegistry::new();
        let early = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let late = Utc.timestamp_opt(1_700_000_500, 0).single().unwrap();

        registry.report(
            PeerId::new("A"),
            ConnectionStatus::alive(early, Duration::from_millis(10)),
        );
        registry.report(PeerId::new("B"), ConnectionStatus::unreachable());
        let snapshot = registry.report(
            PeerId::new("C"),
            ConnectionStatus::alive(late, Duration::from_millis(30)),
        );

        assert!(!snapshot.offline);
        assert_eq!(snapshot.average_latency, Some(Duration::from_millis(20)));
        assert_eq!(snapshot.last_connected_at, Some(late));
    }

    #[tokio::test]
    async fn test_subscribe_sees_latest_snapshot() {
        let registry = ConnectionRegistry::new();
        let mut rx = registry.subscribe();
        assert!(rx.borrow().peers.is_empty());

        registry.report(PeerId::new("a"), ConnectionStatus::unreachable());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().peers.len(), 1);
        assert_eq!(registry.snapshot().peers.len(), 1);
    }

    #[test]
    fn test_concurrent_reports_are_serialized() {
        let registry = ConnectionRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        registry.report(
                            PeerId::new(format!("peer-{i}")),
                            if j % 2 == 0 {
                                ConnectionStatus::unreachable()
                            } else {
                                ConnectionStatus::alive(Utc::now(), Duration::from_millis(j))
                            },
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.peers.len(), 8);
        // Last report per peer had j = 49 (odd): all connected.
        assert!(!snapshot.offline);
        assert_eq!(snapshot.connected_count(), 8);
        assert_eq!(snapshot.average_latency, Some(Duration::from_millis(49)));
    }
}
