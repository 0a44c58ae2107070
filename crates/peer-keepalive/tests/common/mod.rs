//! Scripted in-memory transport for driving supervisors on tokio's paused
//! clock.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use saorsa_peer_keepalive::{PeerId, PeerTransport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// What a single probe call does.
#[derive(Debug, Clone, Copy)]
pub enum ProbeStep {
    /// Succeed after `after`, reporting it as the round trip
    Answer { after: Duration },
    /// Fail after `after`
    Fail { after: Duration },
    /// Never resolve
    Hang,
}

impl ProbeStep {
    pub fn answer_ms(ms: u64) -> Self {
        ProbeStep::Answer {
            after: Duration::from_millis(ms),
        }
    }

    pub fn fail() -> Self {
        ProbeStep::Fail {
            after: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
struct PeerScript {
    probes: VecDeque<ProbeStep>,
    fallback: ProbeStep,
    connect_ok: bool,
    probe_calls: Vec<u64>,
    connect_calls: Vec<u64>,
    disconnect_calls: Vec<u64>,
    stalled_connects: u32,
    stalled_disconnects: u32,
}

impl PeerScript {
    fn new(fallback: ProbeStep, connect_ok: bool) -> Self {
        Self {
            probes: VecDeque::new(),
            fallback,
            connect_ok,
            probe_calls: Vec::new(),
            connect_calls: Vec::new(),
            disconnect_calls: Vec::new(),
            stalled_connects: 0,
            stalled_disconnects: 0,
        }
    }
}

/// Transport whose behavior is scripted per peer and which records the
/// instant (milliseconds since creation) of every call.
pub struct ScriptedTransport {
    start: Instant,
    scripts: Mutex<HashMap<PeerId, PeerScript>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            scripts: Mutex::new(HashMap::new()),
        }
    }

    /// Peer that never answers and never connects.
    pub fn dead(self, peer: &PeerId) -> Self {
        self.script(peer, ProbeStep::fail(), false)
    }

    /// Peer that answers every probe after `ms` and accepts connects.
    pub fn healthy(self, peer: &PeerId, ms: u64) -> Self {
        self.script(peer, ProbeStep::answer_ms(ms), true)
    }

    pub fn script(self, peer: &PeerId, fallback: ProbeStep, connect_ok: bool) -> Self {
        self.scripts
            .lock()
            .insert(peer.clone(), PeerScript::new(fallback, connect_ok));
        self
    }

    /// Queue one-off probe behaviors, consumed before the fallback.
    pub fn queue_probes(&self, peer: &PeerId, steps: impl IntoIterator<Item = ProbeStep>) {
        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(peer)
            .expect("peer must be scripted first");
        script.probes.extend(steps);
    }

    pub fn set_fallback(&self, peer: &PeerId, fallback: ProbeStep, connect_ok: bool) {
        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(peer)
            .expect("peer must be scripted first");
        script.fallback = fallback;
        script.connect_ok = connect_ok;
    }

    /// Make the next `count` connect calls never resolve.
    pub fn stall_connects(&self, peer: &PeerId, count: u32) {
        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(peer)
            .expect("peer must be scripted first");
        script.stalled_connects = count;
    }

    /// Make the next `count` disconnect calls never resolve.
    pub fn stall_disconnects(&self, peer: &PeerId, count: u32) {
        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(peer)
            .expect("peer must be scripted first");
        script.stalled_disconnects = count;
    }

    pub fn probe_calls(&self, peer: &PeerId) -> Vec<u64> {
        self.scripts.lock()[peer].probe_calls.clone()
    }

    pub fn connect_calls(&self, peer: &PeerId) -> Vec<u64> {
        self.scripts.lock()[peer].connect_calls.clone()
    }

    pub fn disconnect_calls(&self, peer: &PeerId) -> Vec<u64> {
        self.scripts.lock()[peer].disconnect_calls.clone()
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap()
    }
}

#[async_trait]
impl PeerTransport for ScriptedTransport {
    async fn probe(&self, peer: &PeerId) -> Result<Duration, TransportError> {
        let step = {
            let now = self.now_ms();
            let mut scripts = self.scripts.lock();
            let script = scripts.get_mut(peer).expect("unscripted peer");
            script.probe_calls.push(now);
            script.probes.pop_front().unwrap_or(script.fallback)
        };

        match step {
            ProbeStep::Answer { after } => {
                tokio::time::sleep(after).await;
                Ok(after)
            }
            ProbeStep::Fail { after } => {
                tokio::time::sleep(after).await;
                Err(TransportError::Other(format!("{peer} did not answer")))
            }
            ProbeStep::Hang => std::future::pending().await,
        }
    }

    async fn connect(&self, peer: &PeerId, _timeout: Duration) -> Result<(), TransportError> {
        let (stall, connect_ok) = {
            let now = self.now_ms();
            let mut scripts = self.scripts.lock();
            let script = scripts.get_mut(peer).expect("unscripted peer");
            script.connect_calls.push(now);
            let stall = script.stalled_connects > 0;
            script.stalled_connects = script.stalled_connects.saturating_sub(1);
            (stall, script.connect_ok)
        };

        if stall {
            std::future::pending::<()>().await;
        }
        if connect_ok {
            Ok(())
        } else {
            Err(TransportError::Other(format!("{peer} refused")))
        }
    }

    async fn disconnect(&self, peer: &PeerId) -> Result<(), TransportError> {
        let stall = {
            let now = self.now_ms();
            let mut scripts = self.scripts.lock();
            let script = scripts.get_mut(peer).expect("unscripted peer");
            script.disconnect_calls.push(now);
            let stall = script.stalled_disconnects > 0;
            script.stalled_disconnects = script.stalled_disconnects.saturating_sub(1);
            stall
        };

        if stall {
            std::future::pending::<()>().await;
        }
        Err(TransportError::NotConnected(peer.clone()))
    }
}
