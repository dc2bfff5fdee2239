//! Namespace routing
//!
//! A connection's request path selects its namespace. Any path of the form
//! `/<token>` where `<token>` is a well-formed namespace token is accepted;
//! there is no allow-list and namespaces need not exist beforehand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use peerlink_core::{NamespaceToken, PeerId, ServerEvent};

use crate::error::RouteError;
use crate::registry::PresenceRegistry;
use crate::session::RelaySession;

/// Maps request paths to namespaces and opens sessions in them
pub struct NamespaceRouter {
    registry: Arc<PresenceRegistry>,
    next_sequence: AtomicU64,
}

impl NamespaceRouter {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self {
            registry,
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Resolve a request path to its namespace token
    pub fn route(&self, path: &str) -> Result<NamespaceToken, RouteError> {
        NamespaceToken::from_path(path).map_err(|source| RouteError::InvalidNamespace {
            path: path.to_string(),
            source,
        })
    }

    /// Open a new session in `namespace` with a fresh peer identifier
    ///
    /// The session starts out `Connecting`; the registry is not touched until
    /// the caller completes the handshake with [`RelaySession::connect`].
    pub fn open_session(
        &self,
        namespace: NamespaceToken,
    ) -> Result<(RelaySession, mpsc::UnboundedReceiver<ServerEvent>), RouteError> {
        let peer_id = self.allocate_peer_id()?;
        Ok(RelaySession::new(peer_id, namespace, self.registry.clone()))
    }

    fn allocate_peer_id(&self) -> Result<PeerId, RouteError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        Ok(PeerId::generate(sequence)?)
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }
}
