//! Canned in-process servers for transport integration tests.
//!
//! A minimal HTTP responder for the framed transport's handshake and
//! long-polling legs, plus hand-rolled WebSocket upgrades for the socket
//! legs, so every test runs against a real loopback wire.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;

use crewdeck_realtime::message::{Packet, SocketEnvelope};

struct ParsedRequest {
    method: String,
    target: String,
    head: String,
    body: String,
}

async fn read_request(stream: &mut TcpStream) -> Option<ParsedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut body = buf[head_end + 4..].to_vec();
    let content_length = head
        .lines()
        .find_map(|line| {
            let lower = line.to_ascii_lowercase();
            lower
                .strip_prefix("content-length:")
                .and_then(|v| v.trim().parse::<usize>().ok())
        })
        .unwrap_or(0);
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    Some(ParsedRequest {
        method,
        target,
        head,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

async fn write_json(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Completes a WebSocket server handshake by hand and hands back the stream.
async fn upgrade_websocket(mut stream: TcpStream, head: &str) -> Option<WebSocketStream<TcpStream>> {
    let key = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("sec-websocket-key") {
            Some(value.trim().to_string())
        } else {
            None
        }
    })?;
    let accept = derive_accept_key(key.as_bytes());
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nupgrade: websocket\r\nconnection: Upgrade\r\nsec-websocket-accept: {accept}\r\n\r\n"
    );
    stream.write_all(response.as_bytes()).await.ok()?;
    Some(WebSocketStream::from_raw_socket(stream, Role::Server, None).await)
}

/// Framed-transport server that never offers the websocket upgrade: the
/// session runs on long-polling. The first poll delivers `packets`; later
/// polls idle. Bodies POSTed to the send leg are forwarded to the returned
/// receiver.
pub async fn spawn_polling_server(packets: Vec<Packet>) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (posted_tx, posted_rx) = mpsc::unbounded_channel();
    let served = Arc::new(AtomicBool::new(false));
    let first_batch = serde_json::to_string(&packets).unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let posted_tx = posted_tx.clone();
            let served = served.clone();
            let first_batch = first_batch.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut stream).await else {
                    return;
                };
                if request.target.starts_with("/realtime/handshake") {
                    let open = json!({
                        "kind": "open",
                        "sid": "poll-session",
                        "upgrades": [],
                        "ping_interval_ms": 200,
                        "ping_timeout_ms": 200
                    });
                    write_json(&mut stream, "200 OK", &open.to_string()).await;
                } else if request.target.starts_with("/realtime/poll") {
                    if !served.swap(true, Ordering::SeqCst) {
                        write_json(&mut stream, "200 OK", &first_batch).await;
                    } else {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        write_json(&mut stream, "200 OK", "[]").await;
                    }
                } else if request.method == "POST" && request.target.starts_with("/realtime/send") {
                    let _ = posted_tx.send(request.body);
                    write_json(&mut stream, "200 OK", "[]").await;
                } else {
                    write_json(&mut stream, "404 Not Found", "[]").await;
                }
            });
        }
    });

    (addr, posted_rx)
}

/// Framed-transport server that offers and completes the websocket upgrade,
/// acknowledges the probe, then pushes `packets` on the socket leg.
pub async fn spawn_upgrade_server(packets: Vec<Packet>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let packets = packets.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut stream).await else {
                    return;
                };
                if request.target.starts_with("/realtime/handshake") {
                    let open = json!({
                        "kind": "open",
                        "sid": "ws-session",
                        "upgrades": ["websocket"],
                        "ping_interval_ms": 200,
                        "ping_timeout_ms": 2000
                    });
                    write_json(&mut stream, "200 OK", &open.to_string()).await;
                    return;
                }
                if !request.target.starts_with("/realtime/ws") {
                    write_json(&mut stream, "404 Not Found", "[]").await;
                    return;
                }

                let Some(mut ws) = upgrade_websocket(stream, &request.head).await else {
                    return;
                };
                // Wait for the probe before acknowledging.
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        if matches!(
                            serde_json::from_str::<Packet>(text.as_str()),
                            Ok(Packet::Upgrade { .. })
                        ) {
                            break;
                        }
                    }
                }
                let ack = serde_json::to_string(&Packet::Upgraded).unwrap();
                if ws.send(Message::Text(ack.into())).await.is_err() {
                    return;
                }
                for packet in &packets {
                    let text = serde_json::to_string(packet).unwrap();
                    if ws.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                // Drain until the client goes away.
                while let Some(Ok(msg)) = ws.next().await {
                    if matches!(msg, Message::Close(_)) {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// Server that rejects the framed handshake with 401 but accepts the raw
/// socket fallback on `/ws`, pushing `envelopes` once connected.
pub async fn spawn_fallback_server(envelopes: Vec<SocketEnvelope>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let envelopes = envelopes.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut stream).await else {
                    return;
                };
                if request.target.starts_with("/realtime/handshake") {
                    write_json(&mut stream, "401 Unauthorized", "{}").await;
                    return;
                }
                if !request.target.starts_with("/ws") {
                    write_json(&mut stream, "404 Not Found", "{}").await;
                    return;
                }

                let Some(mut ws) = upgrade_websocket(stream, &request.head).await else {
                    return;
                };
                for envelope in &envelopes {
                    let text = serde_json::to_string(envelope).unwrap();
                    if ws.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(msg)) = ws.next().await {
                    if matches!(msg, Message::Close(_)) {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// Raw socket server for direct [`crewdeck_realtime::SocketTransport`]
/// tests: accepts `/ws`, records the request target, pushes `envelopes`,
/// and forwards every text frame the client sends.
pub async fn spawn_socket_server(
    envelopes: Vec<SocketEnvelope>,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let envelopes = envelopes.clone();
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut stream).await else {
                    return;
                };
                let _ = seen_tx.send(format!("target {}", request.target));
                let Some(mut ws) = upgrade_websocket(stream, &request.head).await else {
                    return;
                };
                for envelope in &envelopes {
                    let text = serde_json::to_string(envelope).unwrap();
                    if ws.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(msg)) = ws.next().await {
                    match msg {
                        Message::Text(text) => {
                            let _ = seen_tx.send(text.as_str().to_string());
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = seen_tx.send("closed".to_string());
            });
        }
    });

    (addr, seen_rx)
}

/// Server that answers every request with 401.
pub async fn spawn_rejecting_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                if read_request(&mut stream).await.is_some() {
                    write_json(&mut stream, "401 Unauthorized", "{}").await;
                }
            });
        }
    });

    addr
}
