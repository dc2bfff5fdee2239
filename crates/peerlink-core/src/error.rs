//! Error types shared by the server and the client

use thiserror::Error;

/// Reasons a candidate string is not a namespace token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("expected {expected} characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("expected '-' at position {position}")]
    MissingSeparator { position: usize },

    #[error("character {found:?} at position {position} is not in the token alphabet")]
    InvalidChar { position: usize, found: char },
}

/// Token generation failures
#[derive(Error, Debug, Clone)]
pub enum TokenGenerationError {
    #[error("token alphabet is empty")]
    EmptyAlphabet,

    #[error("token alphabet has {0} characters (max 256)")]
    AlphabetTooLarge(usize),

    #[error("system entropy source unavailable: {0}")]
    Entropy(String),
}

impl From<getrandom::Error> for TokenGenerationError {
    fn from(e: getrandom::Error) -> Self {
        TokenGenerationError::Entropy(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid server url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no configuration directory available")]
    NoConfigDir,
}
