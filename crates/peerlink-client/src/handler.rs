//! Session notifications for the surrounding application

use tokio::sync::mpsc;
use tracing::{info, warn};

use peerlink_core::{PeerId, SignalMessage};

use crate::error::ClientError;

/// How a session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disconnect {
    /// WebSocket close code, if the server sent one
    pub code: Option<u16>,
    pub reason: String,
}

/// Callbacks for one session
///
/// Every method defaults to a no-op, so implementors only override what they
/// need. Callbacks run on the session's task and should not block.
pub trait SessionHandler: Send + 'static {
    /// Handshake completed; `id` is this connection's identifier
    fn on_connect(&mut self, _id: &PeerId) {}

    /// Peers that were already in the namespace when this one joined
    fn on_connected_peers(&mut self, _peers: &[PeerId]) {}

    fn on_peer_joined(&mut self, _peer: &PeerId) {}

    fn on_peer_left(&mut self, _peer: &PeerId) {}

    fn on_signal(&mut self, _message: &SignalMessage) {}

    fn on_disconnect(&mut self, _disconnect: &Disconnect) {}

    /// The connection could not be established
    fn on_connect_error(&mut self, _error: &ClientError) {}
}

impl<H: SessionHandler + ?Sized> SessionHandler for Box<H> {
    fn on_connect(&mut self, id: &PeerId) {
        (**self).on_connect(id)
    }

    fn on_connected_peers(&mut self, peers: &[PeerId]) {
        (**self).on_connected_peers(peers)
    }

    fn on_peer_joined(&mut self, peer: &PeerId) {
        (**self).on_peer_joined(peer)
    }

    fn on_peer_left(&mut self, peer: &PeerId) {
        (**self).on_peer_left(peer)
    }

    fn on_signal(&mut self, message: &SignalMessage) {
        (**self).on_signal(message)
    }

    fn on_disconnect(&mut self, disconnect: &Disconnect) {
        (**self).on_disconnect(disconnect)
    }

    fn on_connect_error(&mut self, error: &ClientError) {
        (**self).on_connect_error(error)
    }
}

/// A notification as a value, for [`ChannelHandler`]
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Connected(PeerId),
    ConnectedPeers(Vec<PeerId>),
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    Signal(SignalMessage),
    Disconnected(Disconnect),
    ConnectError(String),
}

/// Forwards every notification into a channel
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

impl SessionHandler for ChannelHandler {
    fn on_connect(&mut self, id: &PeerId) {
        self.forward(Notification::Connected(id.clone()));
    }

    fn on_connected_peers(&mut self, peers: &[PeerId]) {
        self.forward(Notification::ConnectedPeers(peers.to_vec()));
    }

    fn on_peer_joined(&mut self, peer: &PeerId) {
        self.forward(Notification::PeerJoined(peer.clone()));
    }

    fn on_peer_left(&mut self, peer: &PeerId) {
        self.forward(Notification::PeerLeft(peer.clone()));
    }

    fn on_signal(&mut self, message: &SignalMessage) {
        self.forward(Notification::Signal(message.clone()));
    }

    fn on_disconnect(&mut self, disconnect: &Disconnect) {
        self.forward(Notification::Disconnected(disconnect.clone()));
    }

    fn on_connect_error(&mut self, error: &ClientError) {
        self.forward(Notification::ConnectError(error.to_string()));
    }
}

/// Logs every notification
#[derive(Default)]
pub struct LoggingHandler;

impl SessionHandler for LoggingHandler {
    fn on_connect(&mut self, id: &PeerId) {
        info!("Connected to server as {}", id);
    }

    fn on_connected_peers(&mut self, peers: &[PeerId]) {
        let peers: Vec<&str> = peers.iter().map(PeerId::as_str).collect();
        info!("Connected peers: {}", peers.join(", "));
    }

    fn on_peer_joined(&mut self, peer: &PeerId) {
        info!("Peer joined: {}", peer);
    }

    fn on_peer_left(&mut self, peer: &PeerId) {
        info!("Peer left: {}", peer);
    }

    fn on_signal(&mut self, message: &SignalMessage) {
        info!("Signal from {}: {}", message.sender, message.payload);
    }

    fn on_disconnect(&mut self, disconnect: &Disconnect) {
        info!("Disconnected: {}", disconnect.reason);
    }

    fn on_connect_error(&mut self, error: &ClientError) {
        warn!("Connection error: {}", error);
    }
}
