//! Generation tokens for the probe-vs-timer race.
//!
//! Every check cycle a supervisor starts two racers: a liveness probe and a
//! backoff timer. Both capture the [`RaceToken`] handed out when the cycle was
//! scheduled. When a racer completes it must [`settle`](RaceCoordinator::settle)
//! its token before applying any effect; only the first racer of the newest
//! cycle wins. Everything else is stale and dropped:
//!
//! ```text
//!   schedule() ─► token 7 ──┬── probe(7) ok    ─► settle(7) = true   (applied)
//!                           └── timer(7) fires ─► settle(7) = false  (stale)
//!
//!   schedule() ─► token 8 ──┬── timer(8) fires ─► settle(8) = true   (reconnect)
//!                           └── probe(7) late  ─► settle(7) = false  (stale)
//! ```
//!
//! Follow-up work of the winner (the reconnect attempt, the keepalive timer)
//! checks [`is_latest`](RaceCoordinator::is_latest) instead, so an external
//! restart can still supersede it.

use std::fmt;

/// Identifies one scheduled check cycle of one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RaceToken(u64);

impl fmt::Display for RaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-peer "latest scheduled token" slot.
#[derive(Debug, Default)]
pub struct RaceCoordinator {
    generation: u64,
    settled: bool,
}

impl RaceCoordinator {
    /// Create a coordinator with no cycle scheduled yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new cycle, superseding every token handed out before.
    pub fn schedule(&mut self) -> RaceToken {
        self.generation = self.generation.wrapping_add(1);
        self.settled = false;
        RaceToken(self.generation)
    }

    /// Claim the current cycle for `token`.
    ///
    /// Returns `true` for the first completion of the newest cycle only.
    pub fn settle(&mut self, token: RaceToken) -> bool {
        if self.is_open(token) {
            self.settled = true;
            true
        } else {
            false
        }
    }

    /// `token` belongs to the newest cycle and nobody has settled it yet.
    #[must_use]
    pub fn is_open(&self, token: RaceToken) -> bool {
        self.is_latest(token) && !self.settled
    }

    /// `token` belongs to the newest cycle, settled or not.
    #[must_use]
    pub fn is_latest(&self, token: RaceToken) -> bool {
        token.0 == self.generation
    }

    /// Token of the newest cycle.
    #[must_use]
    pub fn latest(&self) -> RaceToken {
        RaceToken(self.generation)
    }

    /// Supersede every outstanding token without starting a new cycle.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.settled = true;
    }
}
