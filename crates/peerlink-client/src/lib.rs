//! Peerlink Client
//!
//! Joins a signaling namespace named by the fragment of a shareable link and
//! surfaces relay events to the application through a [`SessionHandler`].
//!
//! ```no_run
//! use peerlink_client::{ClientBootstrap, LoggingHandler, UrlLink};
//! use peerlink_core::ClientConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let link = UrlLink::parse("https://app.example/")?;
//! let mut bootstrap = ClientBootstrap::new(ClientConfig::default(), link)?;
//! println!("share {}", bootstrap.link());
//! bootstrap.start(LoggingHandler).await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod error;
pub mod handler;
pub mod link;
pub mod session;

pub use bootstrap::{namespace_url, ClientBootstrap};
pub use error::ClientError;
pub use handler::{ChannelHandler, Disconnect, LoggingHandler, Notification, SessionHandler};
pub use link::{prepare_namespace, LinkContext, UrlLink};
pub use session::ClientSession;
