//! Peerlink Core - Shared types, wire events and namespace tokens
//!
//! This crate contains the foundational types used by the signal server and
//! the client. It has no dependencies on networking code.

pub mod config;
pub mod error;
pub mod protocol;
pub mod token;
pub mod types;

pub use config::{ClientConfig, Config, ServerConfig};
pub use error::*;
pub use protocol::*;
pub use token::{NamespaceToken, TokenSource};
pub use types::*;

/// Default WebSocket port
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum size of a single inbound WebSocket frame (256 KB)
pub const MAX_FRAME_SIZE: usize = 256 * 1024;
