//! Per-peer connection supervision.
//!
//! One [`PeerSupervisor`](actor::PeerSupervisor) task runs per peer. It owns
//! that peer's [`SupervisorRecord`] and alternates between "connected,
//! periodically verified alive" and "disconnected, retrying with backoff":
//!
//! ```text
//!                 probe+connect ok
//!   Connecting ─────────────────────► Connected ◄──────────────┐
//!       │                                 │ keepalive interval  │ probe wins
//!       │ attempt failed                  ▼                     │
//!       └───────────────────────────► AwaitingCheck ────────────┘
//!                                      ▲     │ backoff timer wins
//!                      next backoff    │     ▼
//!                                      └── Reconnecting ──► GivenUp
//!                                         (disconnect +     (hard ceiling
//!                                          connect)          exhausted)
//! ```
//!
//! Probes, timers and reconnect attempts run as spawned tasks that post
//! token-tagged completions back to the actor. The actor applies a completion
//! only when its [`RaceToken`](crate::race::RaceToken) still wins, so stale
//! timers and late probes can never double-schedule a keepalive loop or
//! reconnect a peer that already answered.

mod actor;
mod handle;
mod record;

pub use handle::{Supervision, SupervisionHandle};
pub use record::{SupervisorRecord, SupervisorState};

use crate::backoff::{BackoffSequencer, CeilingPolicy, DEFAULT_BACKOFF_SEED};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between liveness checks of a connected peer.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Default timeout handed to `connect`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Timing and retry policy shared by every peer supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Delay between liveness checks while a peer is connected
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,
    /// First backoff interval after a failure
    #[serde(with = "humantime_serde")]
    pub backoff_seed: Duration,
    /// Timeout handed to the transport's connect call
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Soft or hard retry ceiling
    pub ceiling: CeilingPolicy,
}

impl SupervisorSettings {
    /// Backoff generator seeded with `backoff_seed`.
    #[must_use]
    pub fn sequencer(&self) -> BackoffSequencer {
        BackoffSequencer::new(self.backoff_seed)
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            backoff_seed: DEFAULT_BACKOFF_SEED,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ceiling: CeilingPolicy::default(),
        }
    }
}
