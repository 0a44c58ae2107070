//! Fibonacci-style reconnect backoff.
//!
//! Each retry waits for the sum of the two previous intervals, starting from
//! the seed `{retry: 0, last: 0, current: seed}`:
//!
//! ```text
//! retry     0     1     2     3     4     5      6
//! current   1s    1s    2s    3s    5s    8s    13s   ...
//! ```
//!
//! How the sequence ends is decided by a [`CeilingPolicy`]:
//!
//! - **Soft**: intervals stop growing at `max_interval` and retries go on
//!   forever at that pace.
//! - **Hard**: after `max_retries` retries the supervisor gives up and waits
//!   for an external restart.
//!
//! A successful liveness check always resets the state to the seed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default seed interval for the first backoff timer.
pub const DEFAULT_BACKOFF_SEED: Duration = Duration::from_millis(1000);

/// Default soft ceiling, the keep-trying interval once backoff stops growing.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Position in the backoff sequence for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffState {
    /// Number of retries since the last successful check
    pub retry_number: u32,
    /// Interval used by the previous retry
    #[serde(with = "humantime_serde")]
    pub last_interval: Duration,
    /// Interval for the current retry
    #[serde(with = "humantime_serde")]
    pub current_interval: Duration,
}

/// Pure generator for the backoff sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSequencer {
    seed: Duration,
}

impl BackoffSequencer {
    /// Create a sequencer whose first interval is `seed`.
    #[must_use]
    pub const fn new(seed: Duration) -> Self {
        Self { seed }
    }

    /// The seed state `{0, 0, seed}`.
    #[must_use]
    pub const fn seed(&self) -> BackoffState {
        BackoffState {
            retry_number: 0,
            last_interval: Duration::ZERO,
            current_interval: self.seed,
        }
    }

    /// Advance one retry: `current' = last + current`, `last' = current`.
    #[must_use]
    pub fn next(&self, state: &BackoffState) -> BackoffState {
        BackoffState {
            retry_number: state.retry_number.saturating_add(1),
            last_interval: state.current_interval,
            current_interval: state.last_interval.saturating_add(state.current_interval),
        }
    }
}

impl Default for BackoffSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_SEED)
    }
}

/// What happens once backoff grows past its configured bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CeilingPolicy {
    /// Keep retrying forever, never waiting longer than `max_interval`.
    Soft {
        /// Longest delay ever scheduled between checks
        #[serde(with = "humantime_serde")]
        max_interval: Duration,
    },
    /// Stop after `max_retries` retries and enter the given-up state.
    Hard {
        /// Number of retries allowed after the initial attempt
        max_retries: u32,
    },
}

impl Default for CeilingPolicy {
    fn default() -> Self {
        Self::Soft {
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

/// Outcome of asking the policy for the next retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Schedule another check race with this state.
    Retry(BackoffState),
    /// The retry budget is exhausted.
    GiveUp,
}

impl CeilingPolicy {
    /// Delay actually scheduled for the race timer of `state`.
    #[must_use]
    pub fn delay_for(&self, state: &BackoffState) -> Duration {
        match self {
            CeilingPolicy::Soft { max_interval } => state.current_interval.min(*max_interval),
            CeilingPolicy::Hard { .. } => state.current_interval,
        }
    }

    /// Advance `state` after a failed attempt.
    ///
    /// Under the soft ceiling the intervals freeze once the current interval
    /// has reached the maximum; only the retry counter keeps moving.
    #[must_use]
    pub fn advance(&self, sequencer: &BackoffSequencer, state: &BackoffState) -> BackoffStep {
        match self {
            CeilingPolicy::Soft { max_interval } => {
                if state.current_interval >= *max_interval {
                    BackoffStep::Retry(BackoffState {
                        retry_number: state.retry_number.saturating_add(1),
                        ..*state
                    })
                } else {
                    BackoffStep::Retry(sequencer.next(state))
                }
            }
            CeilingPolicy::Hard { max_retries } => {
                let next = sequencer.next(state);
                if next.retry_number > *max_retries {
                    BackoffStep::GiveUp
                } else {
                    BackoffStep::Retry(next)
                }
            }
        }
    }
}
