use super::SupervisorSettings;
use super::record::{SupervisorRecord, SupervisorState};
use crate::backoff::{BackoffSequencer, BackoffStep};
use crate::peer::PeerId;
use crate::race::RaceToken;
use crate::registry::{ConnectionRegistry, ConnectionStatus};
use crate::transport::{PeerTransport, TransportError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Completion posted back to the actor by one of its spawned tasks.
#[derive(Debug)]
pub(crate) enum SupervisorEvent {
    /// Initial probe (+ connect) finished
    InitialAttempt {
        token: RaceToken,
        outcome: Result<Duration, TransportError>,
    },
    /// Initial attempt still pending after a full keepalive interval
    InitialDeadline { token: RaceToken },
    /// Keepalive probe of a check race finished
    ProbeCompleted {
        token: RaceToken,
        outcome: Result<Duration, TransportError>,
    },
    /// Backoff timer of a check race fired
    BackoffElapsed { token: RaceToken },
    /// Disconnect + connect finished, whatever the outcome
    ReconnectFinished { token: RaceToken },
    /// Time for the next liveness check of a connected peer
    KeepaliveDue { token: RaceToken },
}

/// Request from the owning [`SupervisionHandle`](super::SupervisionHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SupervisorCommand {
    /// Drop all outstanding work and start over from `Connecting`
    Restart,
    /// Stop supervising
    Shutdown,
}

/// Actor driving the ping/reconnect state machine of one peer.
pub(crate) struct PeerSupervisor {
    record: SupervisorRecord,
    settings: SupervisorSettings,
    sequencer: BackoffSequencer,
    transport: Arc<dyn PeerTransport>,
    registry: ConnectionRegistry,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    commands: mpsc::Receiver<SupervisorCommand>,
    state_tx: watch::Sender<SupervisorState>,
    timer: Option<AbortHandle>,
}

impl PeerSupervisor {
    pub(crate) fn new(
        peer: PeerId,
        settings: SupervisorSettings,
        transport: Arc<dyn PeerTransport>,
        registry: ConnectionRegistry,
        commands: mpsc::Receiver<SupervisorCommand>,
        state_tx: watch::Sender<SupervisorState>,
    ) -> Self {
        let sequencer = settings.sequencer();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            record: SupervisorRecord::new(peer, &sequencer),
            settings,
            sequencer,
            transport,
            registry,
            events_tx,
            events_rx,
            commands,
            state_tx,
            timer: None,
        }
    }

    /// Run until shutdown is requested or the handle is dropped.
    pub(crate) async fn run(mut self) {
        debug!(peer = %self.record.peer, "supervisor started");
        self.begin_connecting();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SupervisorCommand::Restart) => self.restart(),
                    Some(SupervisorCommand::Shutdown) | None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle(event),
            }
        }

        self.cancel_timer();
        self.record.race.invalidate();
        debug!(peer = %self.record.peer, "supervisor stopped");
    }

    fn handle(&mut self, event: SupervisorEvent) {
        if self.record.state.is_terminal() {
            debug!(peer = %self.record.peer, ?event, "given up, ignoring completion");
            return;
        }
        match event {
            SupervisorEvent::InitialAttempt { token, outcome } => {
                if !self.record.race.settle(token) {
                    self.stale("initial attempt", token);
                    return;
                }
                self.cancel_timer();
                match outcome {
                    Ok(latency) => {
                        info!("🪐 Connected to {}", self.record.peer);
                        self.mark_alive(latency);
                        self.schedule_keepalive(token);
                    }
                    Err(e) => {
                        info!("🪓 Could not connect to {}. Will keep trying.", self.record.peer);
                        debug!(peer = %self.record.peer, error = %e, "initial attempt failed");
                        self.start_backoff_loop();
                    }
                }
            }
            SupervisorEvent::InitialDeadline { token } => {
                if !self.record.race.settle(token) {
                    self.stale("initial deadline", token);
                    return;
                }
                self.timer = None;
                info!(
                    "🪓 No answer from {} within {:?}. Will keep trying.",
                    self.record.peer, self.settings.keepalive_interval
                );
                self.start_backoff_loop();
            }
            SupervisorEvent::ProbeCompleted { token, outcome } => match outcome {
                Ok(latency) => {
                    if !self.record.race.settle(token) {
                        self.stale("probe", token);
                        return;
                    }
                    self.cancel_timer();
                    debug!(peer = %self.record.peer, ?latency, "alive");
                    self.mark_alive(latency);
                    self.schedule_keepalive(token);
                }
                Err(e) => {
                    // The backoff timer of the same race decides what happens next.
                    debug!(peer = %self.record.peer, error = %e, %token, "probe failed");
                }
            },
            SupervisorEvent::BackoffElapsed { token } => {
                if !self.record.race.settle(token) {
                    self.stale("backoff timer", token);
                    return;
                }
                self.timer = None;
                self.begin_reconnect(token);
            }
            SupervisorEvent::ReconnectFinished { token } => {
                if !self.record.race.is_latest(token) {
                    self.stale("reconnect", token);
                    return;
                }
                match self
                    .settings
                    .ceiling
                    .advance(&self.sequencer, &self.record.backoff)
                {
                    BackoffStep::Retry(next) => {
                        self.record.backoff = next;
                        self.begin_check();
                    }
                    BackoffStep::GiveUp => self.give_up(),
                }
            }
            SupervisorEvent::KeepaliveDue { token } => {
                if !self.record.race.is_latest(token)
                    || self.record.state != SupervisorState::Connected
                {
                    self.stale("keepalive timer", token);
                    return;
                }
                self.timer = None;
                self.record.backoff = self.sequencer.seed();
                self.begin_check();
            }
        }
    }

    fn begin_connecting(&mut self) {
        self.set_state(SupervisorState::Connecting);
        let token = self.record.race.schedule();

        let transport = self.transport.clone();
        let peer = self.record.peer.clone();
        let connect_timeout = self.settings.connect_timeout;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = match transport.probe(&peer).await {
                Ok(latency) => transport
                    .connect(&peer, connect_timeout)
                    .await
                    .map(|()| latency),
                Err(e) => Err(e),
            };
            let _ = events.send(SupervisorEvent::InitialAttempt { token, outcome });
        });

        self.arm_timer(
            self.settings.keepalive_interval,
            SupervisorEvent::InitialDeadline { token },
        );
    }

    fn start_backoff_loop(&mut self) {
        self.record.status = self.record.status.disconnected();
        self.report();
        self.record.backoff = self.sequencer.seed();
        self.begin_check();
    }

    /// Start a probe-vs-timer race for the current backoff state.
    fn begin_check(&mut self) {
        let token = self.record.race.schedule();
        let delay = self.settings.ceiling.delay_for(&self.record.backoff);
        debug!(
            peer = %self.record.peer,
            retry_number = self.record.backoff.retry_number,
            current_backoff = ?self.record.backoff.current_interval,
            ?delay,
            %token,
            "starting check race"
        );
        self.set_state(SupervisorState::AwaitingCheck);
        self.arm_timer(delay, SupervisorEvent::BackoffElapsed { token });

        let transport = self.transport.clone();
        let peer = self.record.peer.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = transport.probe(&peer).await;
            let _ = events.send(SupervisorEvent::ProbeCompleted { token, outcome });
        });
    }

    fn begin_reconnect(&mut self, token: RaceToken) {
        debug!(peer = %self.record.peer, %token, "reconnecting");
        self.set_state(SupervisorState::Reconnecting);
        self.record.status = self.record.status.disconnected();
        self.report();

        let transport = self.transport.clone();
        let peer = self.record.peer.clone();
        let connect_timeout = self.settings.connect_timeout;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            // Both calls are bounded so the retry loop always moves on.
            // Failures only mean the next check race decides again.
            match tokio::time::timeout(connect_timeout, transport.disconnect(&peer)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(peer = %peer, error = %e, "disconnect failed"),
                Err(_) => debug!(peer = %peer, ?connect_timeout, "disconnect timed out"),
            }
            match tokio::time::timeout(connect_timeout, transport.connect(&peer, connect_timeout))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(peer = %peer, error = %e, "connect failed"),
                Err(_) => debug!(peer = %peer, ?connect_timeout, "connect timed out"),
            }
            let _ = events.send(SupervisorEvent::ReconnectFinished { token });
        });
    }

    fn give_up(&mut self) {
        self.cancel_timer();
        self.set_state(SupervisorState::GivenUp);
        warn!(
            peer = %self.record.peer,
            retries = self.record.backoff.retry_number,
            "retry budget exhausted, giving up until restarted"
        );
    }

    fn restart(&mut self) {
        info!(peer = %self.record.peer, from = %self.record.state, "restarting supervision");
        self.cancel_timer();
        self.record.race.invalidate();
        self.record.backoff = self.sequencer.seed();
        self.begin_connecting();
    }

    fn schedule_keepalive(&mut self, token: RaceToken) {
        self.set_state(SupervisorState::Connected);
        self.arm_timer(
            self.settings.keepalive_interval,
            SupervisorEvent::KeepaliveDue { token },
        );
    }

    fn mark_alive(&mut self, latency: Duration) {
        self.record.status = ConnectionStatus::alive(Utc::now(), latency);
        self.record.backoff = self.sequencer.seed();
        self.report();
    }

    fn report(&self) {
        self.registry
            .report(self.record.peer.clone(), self.record.status);
    }

    fn set_state(&mut self, state: SupervisorState) {
        self.record.state = state;
        self.state_tx.send_replace(state);
    }

    /// Fire `event` after `delay`, replacing any pending timer.
    fn arm_timer(&mut self, delay: Duration, event: SupervisorEvent) {
        self.cancel_timer();
        let events = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
        self.timer = Some(handle.abort_handle());
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn stale(&self, what: &str, token: RaceToken) {
        debug!(
            peer = %self.record.peer,
            %token,
            latest = %self.record.race.latest(),
            "ignoring stale {what}"
        );
    }
}
