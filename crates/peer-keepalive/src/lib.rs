//! # Saorsa Peer Keepalive
//!
//! Keeps links to a fixed set of peers alive. Each peer gets its own
//! supervisor that periodically probes it while connected and, once a probe
//! loses the race against its backoff timer, reconnects with a fibonacci
//! backoff. Every supervisor reports into a shared [`ConnectionRegistry`]
//! that aggregates offline status, last successful connection and average
//! latency.
//!
//! ```text
//!   peer list ──► Supervision::start ──► PeerSupervisor (one task per peer)
//!                                          │   ▲
//!                        probe / connect / │   │ token-tagged completions
//!                        disconnect        ▼   │
//!                                        PeerTransport
//!                                          │
//!                                          │ report(status)
//!                                          ▼
//!                                  ConnectionRegistry ──► observers, /api/status
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod logging;
pub mod peer;
pub mod peer_list;
pub mod race;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use backoff::{BackoffSequencer, BackoffState, BackoffStep, CeilingPolicy};
pub use config::{ConfigError, KeepaliveConfig};
pub use error::StartupError;
pub use peer::PeerId;
pub use peer_list::PeerListConfig;
pub use race::{RaceCoordinator, RaceToken};
pub use registry::{ConnectionRegistry, ConnectionStatus, RegistrySnapshot, StatusObserver};
pub use supervisor::{
    Supervision, SupervisionHandle, SupervisorRecord, SupervisorSettings, SupervisorState,
};
pub use transport::{PeerTransport, TcpTransport, TransportError};
