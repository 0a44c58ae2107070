use crate::backoff::{BackoffSequencer, BackoffState};
use crate::peer::PeerId;
use crate::race::RaceCoordinator;
use crate::registry::ConnectionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a peer supervisor's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// Initial probe (and connect) in flight
    Connecting,
    /// Peer answered; waiting for the next keepalive check
    Connected,
    /// Probe racing the backoff timer
    AwaitingCheck,
    /// Backoff timer won; disconnect + connect in flight
    Reconnecting,
    /// Hard ceiling exhausted; waiting for an external restart
    GivenUp,
}

impl SupervisorState {
    /// Short label for logs and tables.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Connecting => "connecting",
            SupervisorState::Connected => "connected",
            SupervisorState::AwaitingCheck => "awaiting_check",
            SupervisorState::Reconnecting => "reconnecting",
            SupervisorState::GivenUp => "given_up",
        }
    }

    /// No automatic action will ever leave this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::GivenUp)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one supervisor knows about its peer.
///
/// Owned exclusively by the supervisor task and mutated only by its own
/// transitions. Lost on shutdown.
#[derive(Debug)]
pub struct SupervisorRecord {
    /// Supervised peer
    pub peer: PeerId,
    /// Status last reported to the registry
    pub status: ConnectionStatus,
    /// Position in the backoff sequence
    pub backoff: BackoffState,
    /// Latest-scheduled token slot
    pub race: RaceCoordinator,
    /// Current phase
    pub state: SupervisorState,
}

impl SupervisorRecord {
    /// Fresh record for a peer that has not been contacted yet.
    #[must_use]
    pub fn new(peer: PeerId, sequencer: &BackoffSequencer) -> Self {
        Self {
            peer,
            status: ConnectionStatus::unreachable(),
            backoff: sequencer.seed(),
            race: RaceCoordinator::new(),
            state: SupervisorState::Connecting,
        }
    }
}
