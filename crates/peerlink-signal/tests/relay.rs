use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use peerlink_core::{ClientEvent, NamespaceToken, PeerId, ServerConfig, ServerEvent};
use peerlink_signal::{PresenceRegistry, SignalServer};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a relay on an ephemeral localhost port
async fn start_server(config: ServerConfig) -> (SocketAddr, Arc<PresenceRegistry>) {
    let server = SignalServer::new(ServerConfig {
        port: 0,
        bind: "127.0.0.1".parse().unwrap(),
        ..config
    });
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(async move { server.serve_on(listener).await });
    (addr, registry)
}

async fn recv(ws: &mut Ws) -> ServerEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return ServerEvent::from_json(&text).unwrap();
        }
    }
}

/// Assert no event arrives within a short window
async fn assert_silent(ws: &mut Ws) {
    let deadline = Instant::now() + Duration::from_millis(300);
    loop {
        match timeout(deadline.saturating_duration_since(Instant::now()), ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected event: {}", text),
            Ok(Some(Ok(_))) => continue,
            Ok(other) => panic!("connection ended: {:?}", other),
        }
    }
}

/// Connect to a namespace and consume the handshake events
async fn join(addr: SocketAddr, token: &str) -> (Ws, PeerId, Vec<PeerId>) {
    let (mut ws, _) = connect_async(format!("ws://{}/{}", addr, token))
        .await
        .unwrap();
    let id = match recv(&mut ws).await {
        ServerEvent::Connect { id } => id,
        other => panic!("expected connect, got {:?}", other),
    };
    let peers = match recv(&mut ws).await {
        ServerEvent::ConnectedPeers(peers) => peers,
        other => panic!("expected connected peers, got {:?}", other),
    };
    (ws, id, peers)
}

async fn send(ws: &mut Ws, event: ClientEvent) {
    ws.send(Message::Text(event.to_json().unwrap())).await.unwrap();
}

async fn wait_for_empty(registry: &PresenceRegistry) {
    for _ in 0..100 {
        if registry.namespace_count() == 0 {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("registry still has {:?}", registry.namespaces());
}

#[tokio::test]
async fn test_sequential_joins() {
    let (addr, _) = start_server(ServerConfig::default()).await;
    let ns = "aaaa-bbbb-cccc";

    let (mut a, id_a, peers) = join(addr, ns).await;
    assert!(peers.is_empty());
    let (mut b, id_b, _) = join(addr, ns).await;
    let (mut c, id_c, _) = join(addr, ns).await;

    assert_eq!(recv(&mut a).await, ServerEvent::ConnectedPeer(id_b.clone()));
    assert_eq!(recv(&mut a).await, ServerEvent::ConnectedPeer(id_c.clone()));
    assert_eq!(recv(&mut b).await, ServerEvent::ConnectedPeer(id_c.clone()));

    let (mut d, id_d, peers) = join(addr, ns).await;
    assert_eq!(peers, vec![id_a, id_b, id_c]);

    for ws in [&mut a, &mut b, &mut c] {
        assert_eq!(recv(ws).await, ServerEvent::ConnectedPeer(id_d.clone()));
        assert_silent(ws).await;
    }
    assert_silent(&mut d).await;
}

#[tokio::test]
async fn test_signal_reaches_only_recipient() {
    let (addr, _) = start_server(ServerConfig::default()).await;
    let ns = "aaaa-bbbb-cccc";

    let (mut a, id_a, _) = join(addr, ns).await;
    let (mut b, id_b, _) = join(addr, ns).await;
    let (mut c, _, _) = join(addr, ns).await;
    recv(&mut a).await;
    recv(&mut a).await;
    recv(&mut b).await;

    // Legacy field name and a forged sender
    let frame = json!({
        "event": "signal",
        "data": {"recipient": id_b, "sender": "forged", "signal": "x"}
    });
    a.send(Message::Text(frame.to_string())).await.unwrap();

    match recv(&mut b).await {
        ServerEvent::Signal(msg) => {
            assert_eq!(msg.recipient, id_b);
            assert_eq!(msg.sender, id_a);
            assert_eq!(msg.payload, json!("x"));
        }
        other => panic!("expected signal, got {:?}", other),
    }
    assert_silent(&mut c).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_undeliverable_signal_is_dropped_silently() {
    let (addr, _) = start_server(ServerConfig::default()).await;

    let (mut a, _, _) = join(addr, "aaaa-bbbb-cccc").await;
    let (mut other, id_other, _) = join(addr, "dddd-eeee-ffff").await;

    send(&mut a, ClientEvent::signal("nobody".into(), json!({"sdp": "x"}))).await;
    send(&mut a, ClientEvent::signal(id_other, json!({"sdp": "x"}))).await;
    a.send(Message::Text("garbage".into())).await.unwrap();

    assert_silent(&mut a).await;
    assert_silent(&mut other).await;

    // Still connected after all of the above
    let (mut b, id_b, peers) = join(addr, "aaaa-bbbb-cccc").await;
    assert_eq!(peers.len(), 1);
    assert_eq!(recv(&mut a).await, ServerEvent::ConnectedPeer(id_b));
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_departure_fan_out() {
    let (addr, _) = start_server(ServerConfig::default()).await;
    let ns = "aaaa-bbbb-cccc";

    let (mut a, id_a, _) = join(addr, ns).await;
    let (mut b, id_b, _) = join(addr, ns).await;
    let (mut c, id_c, _) = join(addr, ns).await;
    recv(&mut a).await;
    recv(&mut a).await;
    recv(&mut b).await;

    b.close(None).await.unwrap();

    assert_eq!(recv(&mut a).await, ServerEvent::DisconnectedPeer(id_b.clone()));
    assert_eq!(recv(&mut c).await, ServerEvent::DisconnectedPeer(id_b.clone()));
    assert_silent(&mut a).await;
    assert_silent(&mut c).await;

    let (_e, _, peers) = join(addr, ns).await;
    assert_eq!(peers, vec![id_a, id_c]);
}

#[tokio::test]
async fn test_namespace_isolation() {
    let (addr, _) = start_server(ServerConfig::default()).await;

    let (mut a, _, _) = join(addr, "aaaa-bbbb-cccc").await;
    let (mut d, _, peers) = join(addr, "dddd-eeee-ffff").await;
    assert!(peers.is_empty());

    let (e, _, _) = join(addr, "dddd-eeee-ffff").await;
    drop(e);

    assert!(matches!(recv(&mut d).await, ServerEvent::ConnectedPeer(_)));
    assert!(matches!(recv(&mut d).await, ServerEvent::DisconnectedPeer(_)));
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_registry_cleanup() {
    let (addr, registry) = start_server(ServerConfig::default()).await;

    let (a, _, _) = join(addr, "aaaa-bbbb-cccc").await;
    let (b, _, _) = join(addr, "aaaa-bbbb-cccc").await;
    let (c, _, _) = join(addr, "dddd-eeee-ffff").await;
    assert_eq!(registry.namespace_count(), 2);
    assert_eq!(registry.peer_count(), 3);

    drop(a);
    drop(b);
    drop(c);

    wait_for_empty(&registry).await;
    assert!(registry.namespaces().is_empty());
}

#[tokio::test]
async fn test_reconnect_gets_new_identity() {
    let (addr, registry) = start_server(ServerConfig::default()).await;

    let (mut a, id_first, _) = join(addr, "aaaa-bbbb-cccc").await;
    a.close(None).await.unwrap();
    wait_for_empty(&registry).await;

    let (_a, id_second, peers) = join(addr, "aaaa-bbbb-cccc").await;
    assert_ne!(id_first, id_second);
    assert!(peers.is_empty());
}

#[tokio::test]
async fn test_invalid_namespace_rejected() {
    let (addr, registry) = start_server(ServerConfig::default()).await;

    for path in ["", "ABCD-efgh-ijkl", "abcd-efgh-ijk", "abcdefghijkl", "abcd-efgh-ijkl/x"] {
        let result = connect_async(format!("ws://{}/{}", addr, path)).await;
        assert!(result.is_err(), "{:?} should be rejected", path);
    }
    assert_eq!(registry.namespace_count(), 0);
}

#[tokio::test]
async fn test_idle_peer_is_disconnected() {
    // An idle budget equal to the ping interval is stretched to two pings
    let (addr, registry) = start_server(ServerConfig {
        ping_interval_secs: 1,
        idle_timeout_secs: 1,
        ..ServerConfig::default()
    })
    .await;

    let (mut a, id_a, _) = join(addr, "aaaa-bbbb-cccc").await;
    let (_idle, id_idle, _) = join(addr, "aaaa-bbbb-cccc").await;
    recv(&mut a).await;

    // `a` keeps reading, so it answers pings; `_idle` never polls its socket
    let event = timeout(Duration::from_secs(10), recv(&mut a)).await.unwrap();
    assert_eq!(event, ServerEvent::DisconnectedPeer(id_idle));

    // The responsive peer outlives several ping intervals
    for _ in 0..10 {
        assert_silent(&mut a).await;
    }
    let token = NamespaceToken::parse("aaaa-bbbb-cccc").unwrap();
    assert_eq!(registry.members(&token), vec![id_a]);
}

#[tokio::test]
async fn test_stalled_reader_is_disconnected() {
    let (addr, registry) = start_server(ServerConfig {
        ping_interval_secs: 1,
        idle_timeout_secs: 3,
        ..ServerConfig::default()
    })
    .await;
    let ns = "aaaa-bbbb-cccc";

    let (_stalled, id_stalled, _) = join(addr, ns).await;
    let (mut b, _, _) = join(addr, ns).await;

    // `_stalled` never reads again, so its socket buffers fill up
    let payload = json!({"blob": "x".repeat(200 * 1024)});
    for _ in 0..150 {
        send(&mut b, ClientEvent::signal(id_stalled.clone(), payload.clone())).await;
    }

    // Keep reading `b` so it stays responsive while the stall is detected
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = timeout(remaining, recv(&mut b))
            .await
            .expect("stalled peer was never disconnected");
        if event == ServerEvent::DisconnectedPeer(id_stalled.clone()) {
            break;
        }
    }

    let token = NamespaceToken::parse(ns).unwrap();
    assert!(!registry.members(&token).contains(&id_stalled));
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _) = start_server(ServerConfig::default()).await;
    let (_a, _, _) = join(addr, "aaaa-bbbb-cccc").await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let value: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(value, json!({"status": "healthy", "namespaces": 1, "peers": 1}));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 404 Not Found"));
}

#[tokio::test]
async fn test_concurrent_joins() {
    let (addr, registry) = start_server(ServerConfig::default()).await;
    let ns = "aaaa-bbbb-cccc";

    let handles: Vec<_> = (0..16)
        .map(|_| tokio::spawn(async move { join(addr, ns).await }))
        .collect();

    let mut peers = Vec::new();
    for handle in handles {
        let (ws, id, snapshot) = handle.await.unwrap();
        assert!(!snapshot.contains(&id));
        peers.push((ws, id, snapshot));
    }
    assert_eq!(registry.peer_count(), 16);

    // Snapshot plus later join notifications cover every other peer exactly once
    for (ws, id, snapshot) in peers.iter_mut() {
        let mut known = snapshot.clone();
        while known.len() < 15 {
            match recv(ws).await {
                ServerEvent::ConnectedPeer(other) => {
                    assert_ne!(&other, &*id);
                    assert!(!known.contains(&other));
                    known.push(other);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_silent(ws).await;
    }

    drop(peers);
    wait_for_empty(&registry).await;
}
