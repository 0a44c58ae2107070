//! Peer list retrieval.
//!
//! The supervised peer set is fixed at startup and comes from one of two
//! places:
//!
//! 1. **Static**: addresses listed in the config file or on the command line.
//! 2. **Remote**: a JSON array of addresses served over HTTP, filtered down to
//!    the ones using the expected transport (by default `/wss/`).
//!
//! Static addresses win when both are configured. Failing to fetch the list,
//! or ending up with no addresses at all, is fatal.

use crate::error::StartupError;
use crate::peer::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Default endpoint serving the production peer list.
pub const DEFAULT_PEERS_URL: &str = "https://runfission.com/ipfs/peers";

/// Default transport marker a fetched address must contain.
pub const DEFAULT_TRANSPORT_FILTER: &str = "/wss/";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the peer set comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerListConfig {
    /// Statically configured peer addresses
    pub addresses: Vec<PeerId>,
    /// Endpoint returning a JSON array of peer addresses
    pub url: Option<String>,
    /// Substring a fetched address must contain to be kept
    pub transport_filter: String,
}

impl Default for PeerListConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            url: Some(DEFAULT_PEERS_URL.to_string()),
            transport_filter: DEFAULT_TRANSPORT_FILTER.to_string(),
        }
    }
}

impl PeerListConfig {
    /// Resolve the configured peer set.
    pub async fn resolve(&self) -> Result<Vec<PeerId>, StartupError> {
        let peers = if !self.addresses.is_empty() {
            dedup(self.addresses.clone())
        } else if let Some(url) = &self.url {
            fetch_peers(url, &self.transport_filter).await?
        } else {
            Vec::new()
        };

        if peers.is_empty() {
            return Err(StartupError::EmptyPeerList);
        }
        info!("Supervising {} peers", peers.len());
        Ok(peers)
    }
}

/// Fetch a JSON array of addresses from `url` and keep those containing
/// `transport_filter`.
pub async fn fetch_peers(url: &str, transport_filter: &str) -> Result<Vec<PeerId>, StartupError> {
    let fetch_error = |source: reqwest::Error| StartupError::PeerListFetch {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(fetch_error)?;

    let addresses: Vec<String> = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(fetch_error)?
        .json()
        .await
        .map_err(fetch_error)?;

    debug!(url, fetched = addresses.len(), "peer list fetched");
    Ok(filter_by_transport(addresses, transport_filter))
}

/// Keep addresses containing `transport_filter`, dropping duplicates.
#[must_use]
pub fn filter_by_transport(addresses: Vec<String>, transport_filter: &str) -> Vec<PeerId> {
    dedup(
        addresses
            .into_iter()
            .filter(|address| address.contains(transport_filter))
            .map(PeerId::from)
            .collect(),
    )
}

fn dedup(peers: Vec<PeerId>) -> Vec<PeerId> {
    let mut seen = HashSet::new();
    peers
        .into_iter()
        .filter(|peer| seen.insert(peer.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::Filter;

    fn serve_json(body: &'static str) -> std::net::SocketAddr {
        let route = warp::path("peers").map(move || {
            warp::reply::with_header(body, "Content-Type", "application/json")
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[test]
    fn test_filter_keeps_matching_transport() {
        let addresses = vec![
            "/dns4/a.example.com/tcp/4003/wss/p2p/QmA".to_string(),
            "/ip4/10.0.0.1/tcp/4001/p2p/QmB".to_string(),
            "/dns4/c.example.com/tcp/4003/wss/p2p/QmC".to_string(),
            "/dns4/a.example.com/tcp/4003/wss/p2p/QmA".to_string(),
        ];

        let peers = filter_by_transport(addresses, "/wss/");
        assert_eq!(
            peers,
            vec![
                PeerId::new("/dns4/a.example.com/tcp/4003/wss/p2p/QmA"),
                PeerId::new("/dns4/c.example.com/tcp/4003/wss/p2p/QmC"),
            ]
        );
    }

    #[tokio::test]
    async fn test_static_addresses_win() {
        let config = PeerListConfig {
            addresses: vec![PeerId::new("b"), PeerId::new("a"), PeerId::new("b")],
            url: Some("http://127.0.0.1:1/never-called".to_string()),
            ..Default::default()
        };
        let peers = config.resolve().await.unwrap();
        assert_eq!(peers, vec![PeerId::new("b"), PeerId::new("a")]);
    }

    #[tokio::test]
    async fn test_nothing_configured_is_empty() {
        let config = PeerListConfig {
            url: None,
            ..Default::default()
        };
        let result = config.resolve().await;
        assert!(matches!(result, Err(StartupError::EmptyPeerList)));
    }

    #[tokio::test]
    async fn test_fetch_filters_remote_list() {
        let addr = serve_json(
            r#"["/dns4/x.example.com/tcp/443/wss/p2p/QmX", "/ip4/1.2.3.4/tcp/4001/p2p/QmY"]"#,
        );
        let config = PeerListConfig {
            url: Some(format!("http://{addr}/peers")),
            ..Default::default()
        };

        let peers = config.resolve().await.unwrap();
        assert_eq!(peers, vec![PeerId::new("/dns4/x.example.com/tcp/443/wss/p2p/QmX")]);
    }

    #[tokio::test]
    async fn test_fetch_with_no_matching_transport_is_empty() {
        let addr = serve_json(r#"["/ip4/1.2.3.4/tcp/4001/p2p/QmY"]"#);
        let config = PeerListConfig {
            url: Some(format!("http://{addr}/peers")),
            ..Default::default()
        };

        assert!(matches!(
            config.resolve().await,
            Err(StartupError::EmptyPeerList)
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let addr = serve_json("not json");
        let result = fetch_peers(&format!("http://{addr}/peers"), "/wss/").await;
        assert!(matches!(result, Err(StartupError::PeerListFetch { .. })));

        let result = fetch_peers(&format!("http://{addr}/missing"), "/wss/").await;
        assert!(matches!(result, Err(StartupError::PeerListFetch { .. })));
    }
}
