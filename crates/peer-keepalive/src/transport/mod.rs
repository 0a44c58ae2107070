//! Transport capabilities consumed by the supervisor.
//!
//! The supervisor never touches sockets itself. It asks a [`PeerTransport`] to
//! probe, connect or disconnect a peer and only looks at success or failure.
//! Every error returned here is transient from the supervisor's point of view:
//! it feeds the backoff loop and is never surfaced to the registry.

mod tcp;

pub use tcp::{TcpTransport, socket_target};

use crate::peer::PeerId;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The address token cannot be dialed by this transport
    #[error("cannot dial {peer}: {reason}")]
    InvalidAddress {
        /// Offending peer
        peer: PeerId,
        /// Why the address was rejected
        reason: String,
    },

    /// The operation did not finish in time
    #[error("{operation} to {peer} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Target peer
        peer: PeerId,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// Disconnect requested for a peer without an open link
    #[error("not connected to {0}")]
    NotConnected(PeerId),

    /// Underlying IO failure
    #[error("{operation} to {peer} failed: {source}")]
    Io {
        /// Operation that failed
        operation: &'static str,
        /// Target peer
        peer: PeerId,
        /// Source error
        #[source]
        source: std::io::Error,
    },

    /// Any other transport-specific failure
    #[error("{0}")]
    Other(String),
}

/// Probe, connect and disconnect operations against a single peer.
///
/// Calls may take arbitrarily long or never resolve; the supervisor bounds
/// them with its own timers and ignores late completions.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Liveness check. Returns the measured round trip on success.
    async fn probe(&self, peer: &PeerId) -> Result<Duration, TransportError>;

    /// Establish a link to `peer`, giving up after `timeout`.
    async fn connect(&self, peer: &PeerId, timeout: Duration) -> Result<(), TransportError>;

    /// Tear down the link to `peer`.
    async fn disconnect(&self, peer: &PeerId) -> Result<(), TransportError>;
}
