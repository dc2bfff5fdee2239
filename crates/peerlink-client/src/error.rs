//! Client errors

use thiserror::Error;

use peerlink_core::{ConfigError, TokenGenerationError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not generate a namespace token: {0}")]
    Token(#[from] TokenGenerationError),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out connecting to the signal server")]
    Timeout,

    #[error("unexpected handshake: {0}")]
    Handshake(String),

    #[error("bootstrap has no handler; call start first")]
    NotStarted,

    #[error("session already opened")]
    AlreadyConnected,

    #[error("session is closed")]
    Closed,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}
