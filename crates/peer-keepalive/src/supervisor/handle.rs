use super::SupervisorSettings;
use super::actor::{PeerSupervisor, SupervisorCommand};
use super::record::SupervisorState;
use crate::error::StartupError;
use crate::peer::PeerId;
use crate::registry::ConnectionRegistry;
use crate::transport::PeerTransport;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

struct PeerHandle {
    commands: mpsc::Sender<SupervisorCommand>,
    state: watch::Receiver<SupervisorState>,
    task: JoinHandle<()>,
}

/// Entry point for supervising a fixed peer set.
pub struct Supervision;

impl Supervision {
    /// Spawn one supervisor task per peer.
    ///
    /// Must be called from within a tokio runtime. Fails fast when `peers` is
    /// empty. Duplicate addresses are supervised once.
    pub fn start(
        settings: SupervisorSettings,
        peers: Vec<PeerId>,
        transport: Arc<dyn PeerTransport>,
        registry: ConnectionRegistry,
    ) -> Result<SupervisionHandle, StartupError> {
        if peers.is_empty() {
            return Err(StartupError::EmptyPeerList);
        }

        let mut seen = HashSet::new();
        let mut handles = BTreeMap::new();
        for peer in peers {
            if !seen.insert(peer.clone()) {
                continue;
            }

            let (command_tx, command_rx) = mpsc::channel(8);
            let (state_tx, state_rx) = watch::channel(SupervisorState::Connecting);
            let supervisor = PeerSupervisor::new(
                peer.clone(),
                settings,
                transport.clone(),
                registry.clone(),
                command_rx,
                state_tx,
            );
            let task = tokio::spawn(supervisor.run());

            handles.insert(
                peer,
                PeerHandle {
                    commands: command_tx,
                    state: state_rx,
                    task,
                },
            );
        }

        info!(
            peers = handles.len(),
            keepalive = ?settings.keepalive_interval,
            ceiling = ?settings.ceiling,
            "supervision started"
        );
        Ok(SupervisionHandle { peers: handles })
    }
}

/// Control surface for running supervisors.
///
/// Dropping the handle stops every supervisor.
pub struct SupervisionHandle {
    peers: BTreeMap<PeerId, PeerHandle>,
}

impl SupervisionHandle {
    /// Supervised peers, in address order.
    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.keys()
    }

    /// Current state machine phase of `peer`.
    #[must_use]
    pub fn state(&self, peer: &PeerId) -> Option<SupervisorState> {
        self.peers.get(peer).map(|handle| *handle.state.borrow())
    }

    /// Watch every phase change of `peer`.
    #[must_use]
    pub fn state_changes(&self, peer: &PeerId) -> Option<watch::Receiver<SupervisorState>> {
        self.peers.get(peer).map(|handle| handle.state.clone())
    }

    /// Restart supervision of `peer` from `Connecting`.
    ///
    /// This is the only way out of [`SupervisorState::GivenUp`]. Returns
    /// `false` if the peer is unknown or its supervisor has stopped.
    pub async fn restart(&self, peer: &PeerId) -> bool {
        match self.peers.get(peer) {
            Some(handle) => handle
                .commands
                .send(SupervisorCommand::Restart)
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Stop every supervisor and wait for the tasks to finish.
    pub async fn shutdown(self) {
        for handle in self.peers.values() {
            let _ = handle.commands.send(SupervisorCommand::Shutdown).await;
        }
        let tasks = self.peers.into_values().map(|handle| handle.task);
        futures::future::join_all(tasks).await;
        info!("supervision stopped");
    }
}
