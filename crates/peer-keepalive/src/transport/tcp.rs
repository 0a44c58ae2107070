//! Plain TCP implementation of [`PeerTransport`].
//!
//! Understands the dialable prefix of a multiaddress
//! (`/ip4|ip6|dns|dns4|dns6/<host>/tcp/<port>/...`, anything after the port
//! is ignored) as well as bare `host:port` tokens.
//!
//! - `probe` measures a fresh TCP handshake and closes it again.
//! - `connect` opens a TCP stream and holds it until `disconnect`.

use super::{PeerTransport, TransportError};
use crate::peer::PeerId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Resolve the `(host, port)` pair a peer token points at.
pub fn socket_target(peer: &PeerId) -> Result<(String, u16), TransportError> {
    let invalid = |reason: &str| TransportError::InvalidAddress {
        peer: peer.clone(),
        reason: reason.to_string(),
    };
    let raw = peer.as_str();

    if !raw.starts_with('/') {
        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port or a multiaddress"))?;
        let port = port.parse().map_err(|_| invalid("port is not a number"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        return Ok((host.to_string(), port));
    }

    let mut parts = raw.split('/').skip(1);
    let host = match (parts.next(), parts.next()) {
        (Some("ip4" | "ip6" | "dns" | "dns4" | "dns6"), Some(host)) if !host.is_empty() => host,
        _ => return Err(invalid("missing ip4/ip6/dns host component")),
    };
    let port = match (parts.next(), parts.next()) {
        (Some("tcp"), Some(port)) => port.parse().map_err(|_| invalid("port is not a number"))?,
        _ => return Err(invalid("missing tcp port component")),
    };

    Ok((host.to_string(), port))
}

/// TCP transport holding one stream per connected peer.
#[derive(Debug)]
pub struct TcpTransport {
    probe_timeout: Duration,
    links: DashMap<PeerId, TcpStream>,
}

impl TcpTransport {
    /// Create a transport whose probes give up after `probe_timeout`.
    #[must_use]
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            links: DashMap::new(),
        }
    }

    /// Number of peers with an open link.
    #[must_use]
    pub fn open_links(&self) -> usize {
        self.links.len()
    }

    async fn dial(
        &self,
        peer: &PeerId,
        operation: &'static str,
        timeout: Duration,
    ) -> Result<TcpStream, TransportError> {
        let (host, port) = socket_target(peer)?;
        match tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TransportError::Io {
                operation,
                peer: peer.clone(),
                source,
            }),
            Err(_) => Err(TransportError::Timeout {
                operation,
                peer: peer.clone(),
                timeout,
            }),
        }
    }
}

#[async_trait]
impl PeerTransport for TcpTransport {
    async fn probe(&self, peer: &PeerId) -> Result<Duration, TransportError> {
        let started = Instant::now();
        let stream = self.dial(peer, "probe", self.probe_timeout).await?;
        let latency = started.elapsed();
        drop(stream);
        debug!(peer = %peer.short(), ?latency, "probe answered");
        Ok(latency)
    }

    async fn connect(&self, peer: &PeerId, timeout: Duration) -> Result<(), TransportError> {
        let stream = self.dial(peer, "connect", timeout).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer.short(), error = %e, "failed to set TCP_NODELAY");
        }
        self.links.insert(peer.clone(), stream);
        Ok(())
    }

    async fn disconnect(&self, peer: &PeerId) -> Result<(), TransportError> {
        let (_, mut stream) = self
            .links
            .remove(peer)
            .ok_or_else(|| TransportError::NotConnected(peer.clone()))?;
        stream
            .shutdown()
            .await
            .map_err(|source| TransportError::Io {
                operation: "disconnect",
                peer: peer.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_multiaddr_targets() {
        let cases = [
            ("/ip4/127.0.0.1/tcp/4001", ("127.0.0.1", 4001)),
            ("/dns4/node.example.com/tcp/4003/wss/p2p/12D3KooWabc", ("node.example.com", 4003)),
            ("/ip6/::1/tcp/9000", ("::1", 9000)),
            ("localhost:8080", ("localhost", 8080)),
            ("[::1]:9000", ("::1", 9000)),
        ];
        for (raw, (host, port)) in cases {
            let target = socket_target(&PeerId::new(raw)).unwrap();
            assert_eq!(target, (host.to_string(), port), "parsing {raw}");
        }
    }

    #[test]
    fn test_rejects_undialable_addresses() {
        for raw in ["/p2p/12D3KooWabc", "/ip4/1.2.3.4/udp/9000/quic", "/ip4/1.2.3.4/tcp/x", "nohost"] {
            assert!(
                matches!(
                    socket_target(&PeerId::new(raw)),
                    Err(TransportError::InvalidAddress { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_probe_connect_disconnect_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut accepted = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                accepted.push(socket);
            }
        });

        let transport = TcpTransport::new(Duration::from_secs(2));
        let peer = PeerId::new(format!("/ip4/127.0.0.1/tcp/{}", addr.port()));

        let latency = transport.probe(&peer).await.unwrap();
        assert!(latency < Duration::from_secs(2));

        transport.connect(&peer, Duration::from_secs(2)).await.unwrap();
        assert_eq!(transport.open_links(), 1);

        transport.disconnect(&peer).await.unwrap();
        assert_eq!(transport.open_links(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_without_link_fails() {
        let transport = TcpTransport::new(Duration::from_secs(1));
        let peer = PeerId::new("/ip4/127.0.0.1/tcp/1");
        assert!(matches!(
            transport.disconnect(&peer).await,
            Err(TransportError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_refused_port_fails() {
        // Bind then drop to get a port that is very likely closed.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = TcpTransport::new(Duration::from_secs(1));
        let peer = PeerId::new(format!("127.0.0.1:{port}"));
        assert!(transport.probe(&peer).await.is_err());
    }
}
