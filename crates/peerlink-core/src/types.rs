//! Core identifier types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TokenGenerationError;

/// Opaque identifier of one peer connection
///
/// Assigned by the signal server when the connection is accepted and never
/// reused: a peer that reconnects gets a new identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an identifier from a process-wide sequence number
    ///
    /// The random prefix keeps identifiers unguessable, the sequence suffix
    /// keeps them unique for the lifetime of the process.
    pub fn generate(sequence: u64) -> Result<Self, TokenGenerationError> {
        let mut bytes = [0u8; 4];
        getrandom::fill(&mut bytes)?;
        Ok(Self(format!("{}{:08x}", hex::encode(bytes), sequence)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
