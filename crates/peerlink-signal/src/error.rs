//! Error types for the signal server

use std::net::SocketAddr;

use thiserror::Error;

use peerlink_core::{TokenError, TokenGenerationError};

use crate::session::SessionState;

/// Failures to bind or run the listener
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("port {} is already being used", .addr.port())]
    AddressInUse { addr: SocketAddr },

    #[error("port {} requires elevated user privileges", .addr.port())]
    PermissionDenied { addr: SocketAddr },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl ServeError {
    /// Classify a bind failure so the operator sees why it failed
    pub fn from_bind(addr: SocketAddr, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::AddrInUse => ServeError::AddressInUse { addr },
            std::io::ErrorKind::PermissionDenied => ServeError::PermissionDenied { addr },
            _ => ServeError::Bind { addr, source },
        }
    }
}

/// A request that cannot be mapped to a namespace
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("no namespace at {path:?}: {source}")]
    InvalidNamespace {
        path: String,
        #[source]
        source: TokenError,
    },

    #[error("could not allocate a peer id: {0}")]
    PeerId(#[from] TokenGenerationError),
}

/// Illegal session state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot move session from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_errors_are_distinguished() {
        let addr: SocketAddr = "0.0.0.0:443".parse().unwrap();

        let in_use = ServeError::from_bind(addr, std::io::ErrorKind::AddrInUse.into());
        assert!(matches!(in_use, ServeError::AddressInUse { .. }));
        assert_eq!(in_use.to_string(), "port 443 is already being used");

        let denied = ServeError::from_bind(addr, std::io::ErrorKind::PermissionDenied.into());
        assert_eq!(
            denied.to_string(),
            "port 443 requires elevated user privileges"
        );

        let other = ServeError::from_bind(addr, std::io::ErrorKind::Other.into());
        assert!(matches!(other, ServeError::Bind { .. }));
    }
}
