//! Wire events exchanged over the signaling WebSocket
//!
//! Every frame is a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::PeerId;

/// An addressed signaling payload
///
/// The payload is opaque to the relay: SDP offers, answers and ICE
/// candidates all pass through unmodified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    pub recipient: PeerId,
    pub sender: PeerId,
    #[serde(default, alias = "signal")]
    pub payload: Value,
}

/// Events sent by the server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Handshake completed; carries the identifier assigned to this connection
    #[serde(rename = "connect")]
    Connect { id: PeerId },

    /// Peers already present when this connection joined (excludes self)
    #[serde(rename = "connected peers")]
    ConnectedPeers(Vec<PeerId>),

    /// Another peer joined the namespace
    #[serde(rename = "connected peer")]
    ConnectedPeer(PeerId),

    /// Relayed signaling data
    #[serde(rename = "signal")]
    Signal(SignalMessage),

    /// Another peer left the namespace
    #[serde(rename = "disconnected peer")]
    DisconnectedPeer(PeerId),
}

/// Events sent by a client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Signaling data for another peer in the same namespace
    ///
    /// `sender` is accepted for compatibility but never trusted: the server
    /// stamps the identifier of the sending connection.
    #[serde(rename = "signal")]
    Signal {
        recipient: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<PeerId>,
        #[serde(default, alias = "signal")]
        payload: Value,
    },
}

impl ServerEvent {
    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connect { .. } => "connect",
            ServerEvent::ConnectedPeers(_) => "connected peers",
            ServerEvent::ConnectedPeer(_) => "connected peer",
            ServerEvent::Signal(_) => "signal",
            ServerEvent::DisconnectedPeer(_) => "disconnected peer",
        }
    }
}

impl ClientEvent {
    /// Build a signal event addressed to `recipient`
    pub fn signal(recipient: PeerId, payload: Value) -> Self {
        ClientEvent::Signal {
            recipient,
            sender: None,
            payload,
        }
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
