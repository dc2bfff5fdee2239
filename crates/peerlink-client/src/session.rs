//! Client side of a signaling session
//!
//! A [`ClientSession`] owns one WebSocket to the relay. The handshake runs
//! inline so the caller learns its peer id before `connect` returns; after
//! that a background task dispatches server events to the handler and
//! forwards outgoing signals.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use peerlink_core::{ClientEvent, NamespaceToken, PeerId, ServerEvent};

use crate::error::ClientError;
use crate::handler::{Disconnect, SessionHandler};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Send(String),
    Close,
}

/// Handle to an open session
///
/// Dropping the handle closes the connection.
pub struct ClientSession {
    peer_id: PeerId,
    namespace: NamespaceToken,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ClientSession {
    /// Connect to `url` and complete the handshake within `timeout`
    ///
    /// Failures are reported to `handler.on_connect_error` and returned.
    pub async fn connect<H: SessionHandler>(
        url: &Url,
        namespace: NamespaceToken,
        timeout: Duration,
        mut handler: H,
    ) -> Result<Self, ClientError> {
        let (ws, peer_id) = match handshake(url, timeout).await {
            Ok(connected) => connected,
            Err(e) => {
                warn!("Failed to connect to {}: {}", url, e);
                handler.on_connect_error(&e);
                return Err(e);
            }
        };

        info!("Joined namespace '{}' as {}", namespace, peer_id);
        handler.on_connect(&peer_id);

        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(ws, rx, handler));

        Ok(Self {
            peer_id,
            namespace,
            commands,
            task,
        })
    }

    /// Identifier the server assigned to this connection
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn namespace(&self) -> &NamespaceToken {
        &self.namespace
    }

    pub fn is_open(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Send signaling data to another peer in the namespace
    ///
    /// Delivery is best effort; the server gives no feedback when the
    /// recipient is unknown.
    pub fn send_signal(
        &self,
        recipient: impl Into<PeerId>,
        payload: Value,
    ) -> Result<(), ClientError> {
        let json = ClientEvent::signal(recipient.into(), payload).to_json()?;
        self.commands
            .send(Command::Send(json))
            .map_err(|_| ClientError::Closed)
    }

    /// Close the connection and wait for the session task to finish
    pub async fn close(self) {
        let _ = self.commands.send(Command::Close);
        let _ = self.task.await;
    }

    /// Resolves once the connection has ended, whoever closed it
    pub async fn closed(&self) {
        self.commands.closed().await
    }
}

async fn handshake(url: &Url, timeout: Duration) -> Result<(WsStream, PeerId), ClientError> {
    let connect = async {
        let (mut ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let peer_id = await_connect_event(&mut ws).await?;
        Ok((ws, peer_id))
    };

    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| ClientError::Timeout)?
}

/// The first event on a new connection must be `connect`
async fn await_connect_event(ws: &mut WsStream) -> Result<PeerId, ClientError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return match ServerEvent::from_json(&text) {
                    Ok(ServerEvent::Connect { id }) => Ok(id),
                    Ok(other) => Err(ClientError::Handshake(format!(
                        "expected connect, got {}",
                        other.name()
                    ))),
                    Err(e) => Err(ClientError::Handshake(e.to_string())),
                };
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::Connect(
                    "connection closed during handshake".to_string(),
                ))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ClientError::Connect(e.to_string())),
        }
    }
}

async fn run<H: SessionHandler>(
    ws: WsStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut handler: H,
) {
    let (mut sink, mut stream) = ws.split();
    let mut closing = false;

    let disconnect = loop {
        tokio::select! {
            command = commands.recv(), if !closing => match command {
                Some(Command::Send(json)) => {
                    if let Err(e) = sink.send(Message::Text(json)).await {
                        break transport_error(e);
                    }
                }
                // Explicit close, or every handle dropped
                Some(Command::Close) | None => {
                    closing = true;
                    if sink.send(Message::Close(None)).await.is_err() {
                        break client_close();
                    }
                }
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(&mut handler, &text),
                Some(Ok(Message::Close(frame))) => {
                    break if closing { client_close() } else { server_close(frame) };
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None if closing => break client_close(),
                Some(Err(e)) => break transport_error(e),
                None => break Disconnect {
                    code: None,
                    reason: "connection lost".to_string(),
                },
            },
        }
    };

    debug!("Session ended: {}", disconnect.reason);
    handler.on_disconnect(&disconnect);
}

fn dispatch<H: SessionHandler>(handler: &mut H, text: &str) {
    match ServerEvent::from_json(text) {
        Ok(ServerEvent::ConnectedPeers(peers)) => handler.on_connected_peers(&peers),
        Ok(ServerEvent::ConnectedPeer(peer)) => handler.on_peer_joined(&peer),
        Ok(ServerEvent::DisconnectedPeer(peer)) => handler.on_peer_left(&peer),
        Ok(ServerEvent::Signal(message)) => handler.on_signal(&message),
        Ok(ServerEvent::Connect { id }) => debug!("Ignoring repeated connect event for {}", id),
        Err(e) => warn!("Ignoring malformed server event: {}", e),
    }
}

fn client_close() -> Disconnect {
    Disconnect {
        code: None,
        reason: "client close".to_string(),
    }
}

fn server_close(frame: Option<CloseFrame<'_>>) -> Disconnect {
    match frame {
        Some(frame) => Disconnect {
            code: Some(frame.code.into()),
            reason: if frame.reason.is_empty() {
                "server close".to_string()
            } else {
                frame.reason.into_owned()
            },
        },
        None => Disconnect {
            code: None,
            reason: "server close".to_string(),
        },
    }
}

fn transport_error(e: impl std::fmt::Display) -> Disconnect {
    Disconnect {
        code: None,
        reason: format!("transport error: {}", e),
    }
}
