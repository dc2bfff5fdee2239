//! Namespace tokens
//!
//! A namespace token is three groups of four lowercase ASCII letters joined
//! by hyphens, e.g. `abcd-efgh-ijkl`. Tokens are generated from the OS entropy
//! source and double as the path of the namespace on the signal server and
//! as the fragment of a shareable link.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TokenError, TokenGenerationError};

/// Characters used in namespace tokens
pub const TOKEN_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Separator between token groups
pub const TOKEN_SEPARATOR: char = '-';

/// Length of each token group
pub const TOKEN_GROUPS: [usize; 3] = [4, 4, 4];

/// Total token length including separators
pub const TOKEN_LENGTH: usize = 14;

/// Generate a random string of `groups` groups drawn from `alphabet`
///
/// Each character is drawn uniformly: random bytes that would bias the
/// modulo are rejected and redrawn.
pub fn generate(
    alphabet: &str,
    separator: char,
    groups: &[usize],
) -> Result<String, TokenGenerationError> {
    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() {
        return Err(TokenGenerationError::EmptyAlphabet);
    }
    if chars.len() > 256 {
        return Err(TokenGenerationError::AlphabetTooLarge(chars.len()));
    }

    // Largest multiple of the alphabet size that fits in a byte
    let zone = 256 - (256 % chars.len());

    let mut out = String::new();
    for (i, &len) in groups.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        let mut filled = 0;
        while filled < len {
            let mut bytes = [0u8; 16];
            getrandom::fill(&mut bytes)?;
            for b in bytes {
                if filled == len {
                    break;
                }
                if (b as usize) < zone {
                    out.push(chars[b as usize % chars.len()]);
                    filled += 1;
                }
            }
        }
    }
    Ok(out)
}

/// Check that `candidate` is exactly a namespace token
pub fn validate(candidate: &str) -> bool {
    check(candidate).is_ok()
}

fn check(candidate: &str) -> Result<(), TokenError> {
    let actual = candidate.chars().count();
    if actual != TOKEN_LENGTH {
        return Err(TokenError::Length {
            expected: TOKEN_LENGTH,
            actual,
        });
    }

    let mut chars = candidate.chars().enumerate();
    for (i, &len) in TOKEN_GROUPS.iter().enumerate() {
        if i > 0 {
            if let Some((position, c)) = chars.next() {
                if c != TOKEN_SEPARATOR {
                    return Err(TokenError::MissingSeparator { position });
                }
            }
        }
        for (position, c) in chars.by_ref().take(len) {
            if !TOKEN_ALPHABET.contains(c) {
                return Err(TokenError::InvalidChar { position, found: c });
            }
        }
    }
    Ok(())
}

/// Where a resolved token came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
    /// The existing identifier was valid and is reused verbatim
    Existing,
    /// A fresh token was generated
    Generated,
}

/// A validated namespace token
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceToken(String);

impl NamespaceToken {
    /// Generate a fresh random token
    pub fn generate() -> Result<Self, TokenGenerationError> {
        generate(TOKEN_ALPHABET, TOKEN_SEPARATOR, &TOKEN_GROUPS).map(Self)
    }

    /// Parse a token, rejecting anything but the exact shape
    pub fn parse(candidate: &str) -> Result<Self, TokenError> {
        check(candidate)?;
        Ok(Self(candidate.to_string()))
    }

    /// Parse a token from a URL fragment, with or without the leading `#`
    pub fn from_fragment(fragment: &str) -> Result<Self, TokenError> {
        Self::parse(fragment.strip_prefix('#').unwrap_or(fragment))
    }

    /// Parse a token from a request path of the form `/<token>`
    pub fn from_path(path: &str) -> Result<Self, TokenError> {
        Self::parse(path.strip_prefix('/').unwrap_or(path))
    }

    /// Reuse `existing` if it is a valid token, otherwise generate a new one
    pub fn resolve_or_generate(
        existing: Option<&str>,
    ) -> Result<(Self, TokenSource), TokenGenerationError> {
        if let Some(candidate) = existing {
            match Self::from_fragment(candidate) {
                Ok(token) => return Ok((token, TokenSource::Existing)),
                Err(e) => debug!("Discarding identifier {:?}: {}", candidate, e),
            }
        }
        Ok((Self::generate()?, TokenSource::Generated))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of this namespace on the signal server
    pub fn path(&self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for NamespaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NamespaceToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NamespaceToken {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        check(&value)?;
        Ok(Self(value))
    }
}

impl From<NamespaceToken> for String {
    fn from(token: NamespaceToken) -> Self {
        token.0
    }
}

impl AsRef<str> for NamespaceToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
