//! Shareable links
//!
//! The namespace a client joins lives in the fragment of its shareable link,
//! e.g. `https://app.example/#abcd-efgh-ijkl`. Opening the same link again
//! rejoins the same namespace.

use tracing::info;
use url::Url;

use peerlink_core::{NamespaceToken, TokenGenerationError, TokenSource};

/// Where the shareable identifier is read from and written back to
pub trait LinkContext {
    /// Current fragment, without the leading `#`
    fn fragment(&self) -> Option<String>;

    /// Replace the fragment
    fn set_fragment(&mut self, fragment: &str);
}

/// A shareable link backed by a URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlLink {
    url: Url,
}

impl UrlLink {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(Self::new)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl LinkContext for UrlLink {
    fn fragment(&self) -> Option<String> {
        self.url.fragment().map(str::to_string)
    }

    fn set_fragment(&mut self, fragment: &str) {
        self.url.set_fragment(Some(fragment));
    }
}

impl std::fmt::Display for UrlLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Pick the namespace for this link
///
/// A valid token in the fragment is reused verbatim. Otherwise a new token is
/// generated and written back so the link becomes shareable.
pub fn prepare_namespace<L: LinkContext + ?Sized>(
    link: &mut L,
) -> Result<NamespaceToken, TokenGenerationError> {
    let (token, source) = NamespaceToken::resolve_or_generate(link.fragment().as_deref())?;
    match source {
        TokenSource::Existing => info!("Checked existing namespace '{}'", token),
        TokenSource::Generated => info!("Created new namespace '{}'", token),
    }
    link.set_fragment(token.as_str());
    Ok(token)
}
