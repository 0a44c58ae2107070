//! Peer identity.
//!
//! Peers are identified by the address token they were configured with,
//! typically a multiaddress such as
//! `/dns4/node.example.com/tcp/4003/wss/p2p/12D3KooW...`. The token is opaque
//! to the supervisor: it is compared, hashed and handed to the transport, never
//! parsed or generated here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, comparable address token for a supervised peer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap an address token.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The full address token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log output: the last 8 characters of the final path
    /// segment (the peer hash for `/p2p/...` multiaddresses).
    #[must_use]
    pub fn short(&self) -> &str {
        let last = self
            .0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0);
        let start = last
            .char_indices()
            .rev()
            .nth(7)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &last[start..]
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
