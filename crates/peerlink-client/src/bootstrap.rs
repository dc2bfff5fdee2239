//! Client startup
//!
//! Resolves the namespace from the shareable link when the bootstrap is
//! built, then opens a session either immediately or when asked.

use tracing::{debug, info};
use url::Url;

use peerlink_core::{ClientConfig, NamespaceToken};

use crate::error::ClientError;
use crate::handler::SessionHandler;
use crate::link::{prepare_namespace, LinkContext};
use crate::session::ClientSession;

/// WebSocket URL for `namespace` on the relay at `server`
pub fn namespace_url(server: &Url, namespace: &NamespaceToken) -> Url {
    let mut url = server.clone();
    url.set_path(&namespace.path());
    url.set_query(None);
    url.set_fragment(None);
    url
}

pub struct ClientBootstrap<L> {
    config: ClientConfig,
    server_url: Url,
    link: L,
    namespace: NamespaceToken,
    handler: Option<Box<dyn SessionHandler>>,
    session: Option<ClientSession>,
}

impl<L: LinkContext> ClientBootstrap<L> {
    /// Validate the configuration and settle the namespace for `link`
    ///
    /// The link's fragment is rewritten when a new namespace is generated.
    pub fn new(config: ClientConfig, mut link: L) -> Result<Self, ClientError> {
        let server_url = config.server_url()?;
        let namespace = prepare_namespace(&mut link)?;
        Ok(Self {
            config,
            server_url,
            link,
            namespace,
            handler: None,
            session: None,
        })
    }

    pub fn namespace(&self) -> &NamespaceToken {
        &self.namespace
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn session_url(&self) -> Url {
        namespace_url(&self.server_url, &self.namespace)
    }

    /// Register the handler and connect if `connect_on_init` is set
    pub async fn start<H: SessionHandler>(&mut self, handler: H) -> Result<(), ClientError> {
        if self.handler.is_some() || self.session.is_some() {
            return Err(ClientError::AlreadyConnected);
        }
        self.handler = Some(Box::new(handler));

        if self.config.connect_on_init {
            self.connect().await?;
        } else {
            debug!("Deferring connection to '{}'", self.namespace);
        }
        Ok(())
    }

    /// Open the session with the handler given to [`start`](Self::start)
    ///
    /// A bootstrap opens at most one session.
    pub async fn connect(&mut self) -> Result<&mut ClientSession, ClientError> {
        if self.session.is_some() {
            return Err(ClientError::AlreadyConnected);
        }
        let handler = self.handler.take().ok_or(ClientError::NotStarted)?;

        let url = self.session_url();
        info!("Connecting to {}", url);
        let session = ClientSession::connect(
            &url,
            self.namespace.clone(),
            self.config.connect_timeout(),
            handler,
        )
        .await?;

        Ok(self.session.insert(session))
    }

    pub fn session(&self) -> Option<&ClientSession> {
        self.session.as_ref()
    }

    pub fn into_session(self) -> Option<ClientSession> {
        self.session
    }
}
