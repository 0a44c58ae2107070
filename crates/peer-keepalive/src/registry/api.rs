//! HTTP status API for the connection registry.
//!
//! - `GET /api/status` - Aggregate snapshot (offline, last connected, average latency, peers)
//! - `GET /api/peers`  - Per-peer status list

use super::{ConnectionRegistry, ConnectionStatus};
use crate::peer::PeerId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;
use warp::Filter;

/// One row of `GET /api/peers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerStatusApi {
    /// Full peer address
    pub peer: PeerId,
    /// Short peer id for display
    pub short_id: String,
    /// Latest reported status
    #[serde(flatten)]
    pub status: ConnectionStatus,
}

/// Create status routes backed by `registry`.
pub fn status_routes(
    registry: ConnectionRegistry,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_registry(registry.clone()))
        .and_then(get_status);

    let api_peers = warp::path!("api" / "peers")
        .and(warp::get())
        .and(with_registry(registry))
        .and_then(get_peers);

    api_status.or(api_peers)
}

/// Serve the status API until the process exits.
pub async fn start_status_server(addr: SocketAddr, registry: ConnectionRegistry) {
    info!("Status API listening on http://{}", addr);
    warp::serve(status_routes(registry)).run(addr).await;
}

fn with_registry(
    registry: ConnectionRegistry,
) -> impl Filter<Extract = (ConnectionRegistry,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

async fn get_status(registry: ConnectionRegistry) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&registry.snapshot()))
}

async fn get_peers(registry: ConnectionRegistry) -> Result<impl warp::Reply, warp::Rejection> {
    let peers: Vec<PeerStatusApi> = registry
        .snapshot()
        .peers
        .into_iter()
        .map(|(peer, status)| PeerStatusApi {
            short_id: peer.short().to_string(),
            peer,
            status,
        })
        .collect();
    Ok(warp::reply::json(&peers))
}
