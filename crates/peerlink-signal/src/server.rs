//! WebSocket signal server implementation

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{accept_hdr_async_with_config, tungstenite::Message};
use tracing::{debug, info, warn};

use peerlink_core::{ClientEvent, NamespaceToken, ServerConfig, MAX_FRAME_SIZE};

use crate::error::ServeError;
use crate::registry::PresenceRegistry;
use crate::router::NamespaceRouter;
use crate::session::{DisconnectReason, RelaySession};
use crate::stream::{read_request_head, Rewind};

/// How long to wait for a request head before giving up on a connection
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest request head inspected when sniffing HTTP vs WebSocket
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// How long to wait for a close frame to be written
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Signal server state
pub struct SignalServer {
    router: Arc<NamespaceRouter>,
    config: ServerConfig,
}

impl SignalServer {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(PresenceRegistry::new());
        Self {
            router: Arc::new(NamespaceRouter::new(registry)),
            config,
        }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, ServeError> {
        let addr = self.config.listen_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| ServeError::from_bind(addr, e))
    }

    /// Bind and serve until the process exits
    pub async fn serve(&self) -> Result<(), ServeError> {
        let listener = self.bind().await?;
        self.serve_on(listener).await;
        Ok(())
    }

    /// Serve connections from an already bound listener
    pub async fn serve_on(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("Signal server listening on {}", addr);
        }

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let router = self.router.clone();
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, router, config).await {
                    debug!("Connection error from {}: {:?}", peer_addr, e);
                }
            });
        }
    }

    pub fn registry(&self) -> Arc<PresenceRegistry> {
        self.router.registry().clone()
    }

    /// Get namespace count (for monitoring)
    pub fn namespace_count(&self) -> usize {
        self.router.registry().namespace_count()
    }

    /// Get peer count (for monitoring)
    pub fn peer_count(&self) -> usize {
        self.router.registry().peer_count()
    }
}

impl Default for SignalServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Handle a single connection (HTTP or WebSocket)
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    router: Arc<NamespaceRouter>,
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let head = match tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        read_request_head(&mut stream, MAX_REQUEST_HEAD),
    )
    .await
    {
        Ok(head) => head?,
        Err(_) => {
            debug!("No request head from {} in time", peer_addr);
            return Ok(());
        }
    };
    if head.is_empty() {
        return Ok(());
    }

    if !is_websocket_upgrade(&head) {
        return handle_http_request(&mut stream, &head, router.registry()).await;
    }

    let mut routed: Option<NamespaceToken> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match router.route(request.uri().path()) {
            Ok(token) => {
                routed = Some(token);
                Ok(response)
            }
            Err(e) => {
                debug!("Rejecting handshake from {}: {}", peer_addr, e);
                let mut error = ErrorResponse::new(Some(e.to_string()));
                *error.status_mut() = StatusCode::NOT_FOUND;
                Err(error)
            }
        }
    };

    let ws_config = WebSocketConfig {
        max_message_size: Some(MAX_FRAME_SIZE),
        max_frame_size: Some(MAX_FRAME_SIZE),
        ..WebSocketConfig::default()
    };
    // The head was consumed while sniffing; replay it for the handshake
    let stream = Rewind::new(head, stream);
    let ws_stream = accept_hdr_async_with_config(stream, callback, Some(ws_config)).await?;
    let Some(namespace) = routed else {
        return Ok(());
    };

    let (session, events) = router.open_session(namespace)?;
    debug!(
        "New connection from {} as {} in {}",
        peer_addr,
        session.peer_id(),
        session.namespace()
    );

    run_session(ws_stream, session, events, &config).await;
    Ok(())
}

/// Pump events between one WebSocket and its session until either side ends
async fn run_session<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    mut session: RelaySession,
    mut events: tokio::sync::mpsc::UnboundedReceiver<peerlink_core::ServerEvent>,
    config: &ServerConfig,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    if let Err(e) = session.connect() {
        warn!("Session for {} failed to connect: {}", session.peer_id(), e);
        return;
    }

    let idle_timeout = config.idle_timeout();
    let mut keepalive = interval(config.ping_interval());
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    keepalive.tick().await;
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break DisconnectReason::ServerClose;
                };
                let json = match event.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode {} event: {}", event.name(), e);
                        continue;
                    }
                };
                if let Err(reason) = send_frame(&mut ws_sender, Message::Text(json), idle_timeout).await {
                    break reason;
                }
            }

            frame = ws_receiver.next() => {
                last_seen = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => handle_frame(&session, &text),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(reason) = send_frame(&mut ws_sender, Message::Pong(data), idle_timeout).await {
                            break reason;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break DisconnectReason::ClientClose,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("WebSocket error: {:?}", e);
                        break DisconnectReason::TransportError;
                    }
                }
            }

            _ = keepalive.tick() => {
                if last_seen.elapsed() >= idle_timeout {
                    break DisconnectReason::IdleTimeout;
                }
                if let Err(reason) = send_frame(&mut ws_sender, Message::Ping(Vec::new()), idle_timeout).await {
                    break reason;
                }
            }
        }
    };

    session.disconnect(reason);
    if reason != DisconnectReason::TransportError {
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, ws_sender.close()).await;
    }
    debug!("Connection closed: {} ({:?})", session.peer_id(), reason);
}

/// Write one frame, giving up once the peer stops draining its socket
///
/// A stalled write blocks the whole session loop, so it counts against the
/// same budget as an idle peer.
async fn send_frame<S>(
    sink: &mut S,
    message: Message,
    deadline: Duration,
) -> Result<(), DisconnectReason>
where
    S: Sink<Message> + Unpin,
{
    match tokio::time::timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(DisconnectReason::TransportError),
        Err(_) => Err(DisconnectReason::IdleTimeout),
    }
}

/// Handle one inbound text frame
fn handle_frame(session: &RelaySession, text: &str) {
    let event = match ClientEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(peer = %session.peer_id(), "Ignoring malformed frame: {}", e);
            return;
        }
    };

    match event {
        ClientEvent::Signal {
            recipient,
            sender,
            payload,
        } => {
            if let Some(claimed) = sender.filter(|s| s != session.peer_id()) {
                debug!(peer = %session.peer_id(), %claimed, "Replacing claimed sender");
            }
            session.relay(recipient, payload);
        }
    }
}

/// Whether a request head asks for a WebSocket upgrade
fn is_websocket_upgrade(head: &[u8]) -> bool {
    let head = String::from_utf8_lossy(head);
    head.lines().skip(1).any(|line| {
        let mut parts = line.splitn(2, ':');
        let name = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        name.eq_ignore_ascii_case("upgrade") && value.eq_ignore_ascii_case("websocket")
    })
}

/// Handle an HTTP request (for health checks)
async fn handle_http_request(
    stream: &mut TcpStream,
    head: &[u8],
    registry: &PresenceRegistry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let request = String::from_utf8_lossy(head);

    // Parse the request path
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let namespaces = registry.namespace_count();
    let peers = registry.peer_count();

    let (status, body) = match path {
        "/health" => (
            "200 OK",
            json!({"status": "healthy", "namespaces": namespaces, "peers": peers}),
        ),
        "/stats" => ("200 OK", json!({"namespaces": namespaces, "peers": peers})),
        _ => ("404 Not Found", json!({"error": "not found"})),
    };
    let body = body.to_string();

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes()).await?;
    Ok(())
}
