//! Room Transport
//!
//! Best-effort ordered message channel between the peers of a room. Sends
//! are no-ops unless the transport is connected; inbound traffic is drained
//! once per tick. Two implementations: an in-process loopback hub over tokio
//! channels and a WebSocket client with reconnect backoff.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::game::state::PlayerId;
use crate::network::protocol::{normalize_room_code, Envelope, NetMessage, PlayerLeftMsg, ProtocolError};

/// Link state as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ConnectionState {
    /// No link.
    #[default]
    Disconnected,
    /// First connection attempt in flight.
    Connecting,
    /// Link up; sends are delivered.
    Connected,
    /// Link dropped; retrying.
    Reconnecting,
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Encoding or room code error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The room refused or dropped the join.
    #[error("Join rejected: {0}")]
    Rejected(String),

    /// Every join attempt failed.
    #[error("Failed to join room {room} after {attempts} attempts")]
    JoinFailed {
        /// Room code.
        room: String,
        /// Attempts made.
        attempts: u32,
    },
}

/// A room connection.
pub trait Transport: Send {
    /// Our player id in the room.
    fn local_id(&self) -> PlayerId;

    /// Current link state.
    fn state(&self) -> ConnectionState;

    /// Send to every peer. Returns `false` (and does nothing) when not
    /// connected or the message cannot be encoded.
    fn send(&mut self, message: &NetMessage) -> bool;

    /// Drain inbound messages without blocking.
    fn poll(&mut self) -> Vec<Envelope>;

    /// Leave the room.
    fn disconnect(&mut self);
}

/// Join `room`, retrying `attempts` times with `delay` between failures.
/// The room code is validated before the first attempt.
pub async fn join_room_with_retry<T, F, Fut>(
    room: &str,
    attempts: u32,
    delay: Duration,
    mut join: F,
) -> Result<T, TransportError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let code = normalize_room_code(room)?;
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match join(code.clone()).await {
            Ok(joined) => {
                info!(room = %code, attempt, "joined room");
                return Ok(joined);
            }
            Err(e) => {
                warn!(room = %code, attempt, error = %e, "room join failed");
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(TransportError::JoinFailed { room: code, attempts })
}

// =============================================================================
// LOOPBACK
// =============================================================================

type PeerMap = BTreeMap<PlayerId, mpsc::UnboundedSender<Envelope>>;

/// In-process room: every connected transport receives every other peer's
/// messages.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    peers: Arc<Mutex<PeerMap>>,
}

impl LoopbackHub {
    /// Empty room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a peer.
    pub fn join(&self, id: PlayerId) -> LoopbackTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.peers.lock() {
            Ok(mut peers) => {
                peers.insert(id, tx);
            }
            Err(_) => warn!("loopback hub lock poisoned on join"),
        }
        debug!(player = %id.short(), "loopback peer joined");
        LoopbackTransport {
            id,
            hub: self.clone(),
            inbound: rx,
            state: ConnectionState::Connected,
        }
    }

    /// Connected peer count.
    pub fn peer_count(&self) -> usize {
        self.peers.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn broadcast(&self, from: PlayerId, message: &NetMessage) -> bool {
        let Ok(mut peers) = self.peers.lock() else {
            warn!("loopback hub lock poisoned on send");
            return false;
        };
        let envelope = Envelope::new(from, message.clone());
        peers.retain(|id, tx| *id == from || tx.send(envelope.clone()).is_ok());
        true
    }

    fn leave(&self, id: PlayerId) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.remove(&id);
        }
        self.broadcast(id, &NetMessage::PlayerLeft(PlayerLeftMsg { player_id: id }));
    }
}

/// One peer of a `LoopbackHub`.
#[derive(Debug)]
pub struct LoopbackTransport {
    id: PlayerId,
    hub: LoopbackHub,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    state: ConnectionState,
}

impl Transport for LoopbackTransport {
    fn local_id(&self) -> PlayerId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn send(&mut self, message: &NetMessage) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        self.hub.broadcast(self.id, message)
    }

    fn poll(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.inbound.try_recv() {
            out.push(envelope);
        }
        out
    }

    fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.hub.leave(self.id);
        debug!(player = %self.id.short(), "loopback peer left");
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// WEBSOCKET
// =============================================================================

/// Reconnect schedule.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Retries before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    /// Exponential backoff for retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// WebSocket room client. A background task owns the socket; the session
/// talks to it through channels.
#[derive(Debug)]
pub struct WebSocketTransport {
    id: PlayerId,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    state: watch::Receiver<ConnectionState>,
    task: tokio::task::JoinHandle<()>,
}

impl WebSocketTransport {
    /// Start connecting to `url`. Must be called inside a tokio runtime.
    pub fn connect(url: impl Into<String>, id: PlayerId, policy: ReconnectPolicy) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let task = tokio::spawn(run_socket(url.into(), out_rx, in_tx, state_tx, policy));

        Self {
            id,
            outbound: out_tx,
            inbound: in_rx,
            state: state_rx,
            task,
        }
    }

    /// Connect to a room server and wait until the link is up.
    pub async fn join(
        base_url: &str,
        room: String,
        id: PlayerId,
        policy: ReconnectPolicy,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = format!("{}/rooms/{}?player={}", base_url.trim_end_matches('/'), room, id);
        let mut transport = Self::connect(url, id, policy);
        let connected = tokio::time::timeout(timeout, transport.wait_for(ConnectionState::Connected)).await;
        match connected {
            Ok(true) => Ok(transport),
            _ => {
                transport.disconnect();
                Err(TransportError::Rejected(format!("room {room} unreachable")))
            }
        }
    }

    /// Wait until the link reaches `target`. `false` if the socket task ended
    /// first.
    pub async fn wait_for(&mut self, target: ConnectionState) -> bool {
        loop {
            if *self.state.borrow_and_update() == target {
                return true;
            }
            if self.state.changed().await.is_err() {
                return *self.state.borrow() == target;
            }
        }
    }
}

impl Transport for WebSocketTransport {
    fn local_id(&self) -> PlayerId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn send(&mut self, message: &NetMessage) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        match message.to_json() {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(e) => {
                warn!(error = %e, "failed to encode outbound message");
                false
            }
        }
    }

    fn poll(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.inbound.try_recv() {
            out.push(envelope);
        }
        out
    }

    fn disconnect(&mut self) {
        self.task.abort();
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Socket task: connect, pump messages, reconnect with backoff.
async fn run_socket(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<Envelope>,
    state: watch::Sender<ConnectionState>,
    policy: ReconnectPolicy,
) {
    let mut retries = 0u32;

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                retries = 0;
                state.send_replace(ConnectionState::Connected);
                info!(%url, "transport connected");

                let (mut ws_sender, mut ws_receiver) = ws_stream.split();
                loop {
                    tokio::select! {
                        out = outbound.recv() => match out {
                            Some(text) => {
                                if ws_sender.send(Message::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                let _ = ws_sender.close().await;
                                state.send_replace(ConnectionState::Disconnected);
                                return;
                            }
                        },
                        msg = ws_receiver.next() => match msg {
                            Some(Ok(Message::Text(text))) => match Envelope::from_json(&text) {
                                Ok(envelope) => {
                                    if inbound.send(envelope).is_err() {
                                        return;
                                    }
                                }
                                Err(e) => debug!(error = %e, "dropping malformed message"),
                            },
                            Some(Ok(Message::Binary(data))) => match Envelope::from_bytes(&data) {
                                Ok(envelope) => {
                                    if inbound.send(envelope).is_err() {
                                        return;
                                    }
                                }
                                Err(e) => debug!(error = %e, "dropping malformed frame"),
                            },
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                warn!(error = %e, "transport read failed");
                                break;
                            }
                            _ => {}
                        },
                    }
                }
            }
            Err(e) => warn!(%url, error = %e, "transport connect failed"),
        }

        retries += 1;
        if policy.max_attempts.is_some_and(|max| retries > max) {
            warn!(%url, retries, "transport giving up");
            state.send_replace(ConnectionState::Disconnected);
            return;
        }
        state.send_replace(ConnectionState::Reconnecting);
        tokio::time::sleep(policy.delay(retries)).await;
    }
}
