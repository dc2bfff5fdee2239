//! Peerlink Signal Server
//!
//! Lightweight signaling relay that lets browser peers find each other and
//! exchange WebRTC negotiation data. Clients connect via WebSocket to a
//! namespace path and exchange opaque payloads addressed by peer id.
//!
//! # Protocol
//!
//! 1. Client connects to `/<namespace-token>`; the namespace is created on demand
//! 2. Server sends `connect` with the client's id, then `connected peers`
//! 3. Every other member receives `connected peer` with the new id
//! 4. `signal` frames are relayed to their recipient within the namespace
//! 5. On disconnect the remaining members receive `disconnected peer`

pub mod banner;
pub mod error;
pub mod registry;
pub mod relay;
pub mod router;
pub mod server;
pub mod session;
pub mod stream;

pub use error::{RouteError, ServeError, SessionError};
pub use registry::{NamespaceSummary, PresenceRegistry};
pub use relay::{DropReason, RelayOutcome, SignalRelay};
pub use router::NamespaceRouter;
pub use server::SignalServer;
pub use session::{DisconnectReason, RelaySession, SessionState};
