//! Point-to-point signal forwarding
//!
//! Delivery is best-effort and at most once. A signal whose recipient is not
//! connected to the sender's namespace is dropped without telling the sender.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use peerlink_core::{NamespaceToken, PeerId, ServerEvent, SignalMessage};

use crate::registry::{LookupError, PresenceRegistry};

/// Why a signal was not delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The sender's namespace has no members
    NamespaceGone,
    /// No peer with that identifier in the sender's namespace
    UnknownRecipient,
    /// The recipient was found but its session already stopped reading
    RecipientClosed,
    /// Sender and recipient are the same connection
    SelfAddressed,
    /// The sending session is not connected
    NotConnected,
}

/// Result of one relay attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    Dropped(DropReason),
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered)
    }
}

/// Forwards signals between sessions of the same namespace
#[derive(Clone)]
pub struct SignalRelay {
    registry: Arc<PresenceRegistry>,
}

impl SignalRelay {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// Forward `message` to its recipient inside `namespace`
    ///
    /// The recipient is resolved in `namespace` only, so an identifier that
    /// belongs to another namespace is treated as unknown. The payload is
    /// passed through untouched.
    pub fn relay(&self, namespace: &NamespaceToken, message: SignalMessage) -> RelayOutcome {
        if message.recipient == message.sender {
            return self.dropped(namespace, &message, DropReason::SelfAddressed);
        }

        let outbox = match self.registry.lookup(namespace, &message.recipient) {
            Ok(outbox) => outbox,
            Err(LookupError::NamespaceGone) => {
                return self.dropped(namespace, &message, DropReason::NamespaceGone)
            }
            Err(LookupError::UnknownPeer) => {
                return self.dropped(namespace, &message, DropReason::UnknownRecipient)
            }
        };

        let recipient = message.recipient.clone();
        let sender = message.sender.clone();
        match outbox.send(ServerEvent::Signal(message)) {
            Ok(()) => {
                debug!(namespace = %namespace, from = %sender, to = %recipient, "Signal relayed");
                RelayOutcome::Delivered
            }
            Err(_) => {
                debug!(namespace = %namespace, from = %sender, to = %recipient, "Signal dropped: recipient closed");
                RelayOutcome::Dropped(DropReason::RecipientClosed)
            }
        }
    }

    /// Build and forward a signal stamped with the sending session's identifier
    pub fn relay_from(
        &self,
        namespace: &NamespaceToken,
        sender: &PeerId,
        recipient: PeerId,
        payload: Value,
    ) -> RelayOutcome {
        self.relay(
            namespace,
            SignalMessage {
                recipient,
                sender: sender.clone(),
                payload,
            },
        )
    }

    fn dropped(
        &self,
        namespace: &NamespaceToken,
        message: &SignalMessage,
        reason: DropReason,
    ) -> RelayOutcome {
        debug!(
            namespace = %namespace,
            from = %message.sender,
            to = %message.recipient,
            ?reason,
            "Signal dropped"
        );
        RelayOutcome::Dropped(reason)
    }
}
