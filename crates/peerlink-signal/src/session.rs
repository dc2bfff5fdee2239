//! Relay session lifecycle
//!
//! One session per WebSocket connection. A session moves
//! `Connecting -> Connected -> Disconnected` and never back: a peer that
//! reconnects gets a new session with a new identifier.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use peerlink_core::{NamespaceToken, PeerId, ServerEvent};

use crate::error::SessionError;
use crate::registry::{Outbox, PresenceRegistry};
use crate::relay::{DropReason, RelayOutcome, SignalRelay};

/// Lifecycle state of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Why a session ended
///
/// All reasons run the same cleanup; they only differ in what is logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame or closed the stream
    ClientClose,
    /// Reading from or writing to the socket failed
    TransportError,
    /// No inbound frame within the idle timeout
    IdleTimeout,
    /// The server ended the session
    ServerClose,
}

/// One peer's connection to one namespace
pub struct RelaySession {
    peer_id: PeerId,
    namespace: NamespaceToken,
    state: SessionState,
    registry: Arc<PresenceRegistry>,
    relay: SignalRelay,
    /// Handed to the registry on connect
    outbox: Option<Outbox>,
}

impl RelaySession {
    /// Create a session in the `Connecting` state
    ///
    /// Returns the receiving half of the session's event queue: presence
    /// events and relayed signals for this peer arrive there once connected.
    pub fn new(
        peer_id: PeerId,
        namespace: NamespaceToken,
        registry: Arc<PresenceRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (outbox, events) = mpsc::unbounded_channel();
        let relay = SignalRelay::new(registry.clone());
        let session = Self {
            peer_id,
            namespace,
            state: SessionState::Connecting,
            registry,
            relay,
            outbox: Some(outbox),
        };
        (session, events)
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn namespace(&self) -> &NamespaceToken {
        &self.namespace
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handshake completed: announce the identifier and join the namespace
    ///
    /// Queues `connect` followed by the `connected peers` snapshot, and
    /// returns the snapshot.
    pub fn connect(&mut self) -> Result<Vec<PeerId>, SessionError> {
        let outbox = match (self.state, self.outbox.take()) {
            (SessionState::Connecting, Some(outbox)) => outbox,
            (from, outbox) => {
                self.outbox = outbox;
                return Err(SessionError::InvalidTransition {
                    from,
                    to: SessionState::Connected,
                });
            }
        };

        let _ = outbox.send(ServerEvent::Connect {
            id: self.peer_id.clone(),
        });
        let snapshot = self
            .registry
            .admit(&self.namespace, self.peer_id.clone(), outbox);
        self.state = SessionState::Connected;

        info!(
            namespace = %self.namespace,
            peer = %self.peer_id,
            present = snapshot.len(),
            "Peer connected"
        );
        Ok(snapshot)
    }

    /// Forward a signal from this peer; the sender is always this session
    pub fn relay(&self, recipient: PeerId, payload: Value) -> RelayOutcome {
        if self.state != SessionState::Connected {
            return RelayOutcome::Dropped(DropReason::NotConnected);
        }
        self.relay
            .relay_from(&self.namespace, &self.peer_id, recipient, payload)
    }

    /// Leave the namespace
    ///
    /// Returns true on the transition that performed the removal. Later calls,
    /// and calls on a session that never connected, only mark it disconnected.
    pub fn disconnect(&mut self, reason: DisconnectReason) -> bool {
        let was_connected = self.state == SessionState::Connected;
        self.state = SessionState::Disconnected;
        self.outbox = None;

        if !was_connected {
            return false;
        }

        self.registry.remove(&self.namespace, &self.peer_id);
        info!(
            namespace = %self.namespace,
            peer = %self.peer_id,
            ?reason,
            "Peer disconnected"
        );
        true
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if self.state == SessionState::Connected {
            debug!(peer = %self.peer_id, "Session dropped while connected");
            self.disconnect(DisconnectReason::ServerClose);
        }
    }
}
