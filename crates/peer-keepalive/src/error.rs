//! Startup failures.
//!
//! Only startup can fail. Everything that goes wrong after supervision has
//! started is a transient per-attempt failure and only shows up as a
//! `connected = false` status.

use thiserror::Error;

/// Fatal condition that prevents supervision from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// No peers configured, or every fetched address was filtered out
    #[error("💥 Couldn't start supervision, peer list is empty")]
    EmptyPeerList,

    /// The peer list endpoint could not be fetched or decoded
    #[error("💥 Couldn't start supervision, failed to fetch peer list from {url}: {source}")]
    PeerListFetch {
        /// Endpoint that failed
        url: String,
        /// Underlying HTTP or decode error
        #[source]
        source: reqwest::Error,
    },
}
