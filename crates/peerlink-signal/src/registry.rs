//! Presence registry
//!
//! Maps each namespace token to the peers currently connected to it. Every
//! namespace has its own lock; admitting, removing and the presence events
//! they fan out happen inside that one critical section, so every member
//! observes joins and departures in the same order. Namespaces are created on
//! first admission and dropped when their last member leaves.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use peerlink_core::{NamespaceToken, PeerId, ServerEvent};

/// Sending half of a session's event queue
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Lookup failures when resolving a peer inside a namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupError {
    /// The namespace has no members
    NamespaceGone,
    /// The namespace exists but the peer is not in it
    UnknownPeer,
}

/// Members of one namespace with their count, for observers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceSummary {
    pub token: NamespaceToken,
    pub peers: usize,
}

struct Member {
    peer_id: PeerId,
    outbox: Outbox,
}

#[derive(Default)]
struct Members {
    /// In join order
    list: Vec<Member>,
    /// Set once the namespace emptied and left the map; never joined again
    retired: bool,
}

impl Members {
    fn position(&self, peer_id: &PeerId) -> Option<usize> {
        self.list.iter().position(|m| &m.peer_id == peer_id)
    }

    fn peer_ids(&self) -> Vec<PeerId> {
        self.list.iter().map(|m| m.peer_id.clone()).collect()
    }

    fn broadcast(&self, event: &ServerEvent) {
        for member in &self.list {
            // A closed outbox belongs to a session that is tearing down and
            // will be removed under this same lock shortly
            let _ = member.outbox.send(event.clone());
        }
    }
}

/// One namespace and its members
struct Namespace {
    members: Mutex<Members>,
}

/// Per-namespace presence for the whole server
#[derive(Default)]
pub struct PresenceRegistry {
    namespaces: DashMap<NamespaceToken, Arc<Namespace>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `peer_id` into `token`'s namespace
    ///
    /// Returns the peers that were present before the admission. The same
    /// snapshot is queued on `outbox` as `connected peers`, and every other
    /// member is sent one `connected peer` for the joiner, all before the
    /// namespace lock is released.
    pub fn admit(&self, token: &NamespaceToken, peer_id: PeerId, outbox: Outbox) -> Vec<PeerId> {
        loop {
            let namespace = self
                .namespaces
                .entry(token.clone())
                .or_insert_with(|| {
                    debug!(namespace = %token, "Namespace created");
                    Arc::new(Namespace {
                        members: Mutex::new(Members::default()),
                    })
                })
                .clone();

            let mut members = namespace.members.lock();
            if members.retired {
                // Emptied and unmapped between our lookup and our lock
                continue;
            }

            if members.position(&peer_id).is_some() {
                warn!(namespace = %token, peer = %peer_id, "Peer admitted twice, ignoring");
                return members
                    .peer_ids()
                    .into_iter()
                    .filter(|id| id != &peer_id)
                    .collect();
            }

            let snapshot = members.peer_ids();
            let _ = outbox.send(ServerEvent::ConnectedPeers(snapshot.clone()));
            members.broadcast(&ServerEvent::ConnectedPeer(peer_id.clone()));
            members.list.push(Member {
                peer_id: peer_id.clone(),
                outbox,
            });

            debug!(
                namespace = %token,
                peer = %peer_id,
                peers = members.list.len(),
                "Peer admitted"
            );
            return snapshot;
        }
    }

    /// Remove `peer_id` from `token`'s namespace
    ///
    /// Every remaining member is sent one `disconnected peer`. The namespace
    /// is dropped once empty. Removing a peer that is not present is a no-op
    /// and returns false.
    pub fn remove(&self, token: &NamespaceToken, peer_id: &PeerId) -> bool {
        let Some(namespace) = self.namespaces.get(token).map(|entry| entry.value().clone()) else {
            warn!(namespace = %token, peer = %peer_id, "Remove from unknown namespace");
            return false;
        };

        let mut members = namespace.members.lock();
        let Some(index) = members.position(peer_id) else {
            warn!(namespace = %token, peer = %peer_id, "Remove of absent peer");
            return false;
        };

        members.list.remove(index);
        members.broadcast(&ServerEvent::DisconnectedPeer(peer_id.clone()));

        if members.list.is_empty() {
            members.retired = true;
            self.namespaces
                .remove_if(token, |_, current| Arc::ptr_eq(current, &namespace));
            debug!(namespace = %token, "Namespace removed (empty)");
        }

        debug!(namespace = %token, peer = %peer_id, "Peer removed");
        true
    }

    /// Resolve the outbox of `peer_id` within `token`'s namespace only
    pub fn lookup(&self, token: &NamespaceToken, peer_id: &PeerId) -> Result<Outbox, LookupError> {
        let namespace = self
            .namespaces
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(LookupError::NamespaceGone)?;

        let members = namespace.members.lock();
        members
            .position(peer_id)
            .map(|i| members.list[i].outbox.clone())
            .ok_or(LookupError::UnknownPeer)
    }

    /// Peers currently in `token`'s namespace, in join order
    pub fn members(&self, token: &NamespaceToken) -> Vec<PeerId> {
        self.namespaces
            .get(token)
            .map(|entry| entry.value().clone())
            .map(|namespace| namespace.members.lock().peer_ids())
            .unwrap_or_default()
    }

    /// All namespaces that currently have members
    pub fn namespaces(&self) -> Vec<NamespaceSummary> {
        let namespaces: Vec<(NamespaceToken, Arc<Namespace>)> = self
            .namespaces
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut summaries: Vec<NamespaceSummary> = namespaces
            .into_iter()
            .filter_map(|(token, namespace)| {
                let peers = namespace.members.lock().list.len();
                (peers > 0).then_some(NamespaceSummary { token, peers })
            })
            .collect();
        summaries.sort_by(|a, b| a.token.cmp(&b.token));
        summaries
    }

    /// Number of namespaces with members
    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    /// Number of connected peers across all namespaces
    pub fn peer_count(&self) -> usize {
        self.namespaces().iter().map(|s| s.peers).sum()
    }
}
