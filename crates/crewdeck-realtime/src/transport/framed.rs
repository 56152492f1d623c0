//! Framed multiplexed transport.
//!
//! Negotiates a session via an HTTP open handshake, then upgrades to a
//! full-duplex WebSocket when the server offers it. If the upgrade is not
//! offered or the probe fails, the session stays on long-polling; that
//! transport-level fallback happens at most once. Both legs exchange
//! [`Packet`]s, with application events multiplexed as [`Packet::Event`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crewdeck_core::config::realtime::RealtimeConfig;
use crewdeck_core::error::ErrorKind;
use crewdeck_core::{SyncError, SyncResult};

use crate::message::{OpenFrame, Packet};

use super::{Channel, InboundFrame, OutboundFrame, Transport, TransportKind, ws_endpoint};

const WEBSOCKET_UPGRADE: &str = "websocket";

/// The framed multiplexed wire strategy.
#[derive(Debug)]
pub struct FramedTransport {
    http: reqwest::Client,
    buffer_size: usize,
    connect_timeout: Duration,
}

impl FramedTransport {
    /// Creates the transport from client configuration.
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            buffer_size: config.channel_buffer_size,
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
        }
    }

    /// Performs the open handshake and returns the session parameters.
    async fn handshake(&self, endpoint: &str, token: &str) -> SyncResult<OpenFrame> {
        let url = format!("{endpoint}/realtime/handshake");
        let response = self
            .http
            .get(&url)
            .query(&[("token", token)])
            .timeout(self.connect_timeout)
            .send()
            .await
            .map_err(|e| map_http_error(e, "handshake"))?;

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403) {
            return Err(SyncError::auth(format!("handshake rejected: {status}")));
        }
        if !status.is_success() {
            return Err(SyncError::connect(format!("handshake returned {status}")));
        }

        let packet: Packet = response
            .json()
            .await
            .map_err(|e| SyncError::with_source(ErrorKind::Connect, format!("malformed handshake reply: {e}"), e))?;

        match packet {
            Packet::Open(open) => Ok(open),
            other => Err(SyncError::connect(format!(
                "unexpected handshake reply: {other:?}"
            ))),
        }
    }

    /// Attempts the WebSocket upgrade leg.
    async fn try_upgrade(
        &self,
        endpoint: &str,
        token: &str,
        open: &OpenFrame,
    ) -> SyncResult<Channel> {
        let url = format!(
            "{}/realtime/ws?sid={}&token={}",
            ws_endpoint(endpoint),
            open.sid,
            token
        );
        let (stream, _response) = connect_async(&url).await.map_err(|e| {
            SyncError::with_source(
                ErrorKind::Connect,
                format!("upgrade socket connect failed: {e}"),
                e,
            )
        })?;
        let (mut sink, mut stream) = stream.split();

        // Probe: ask for the upgrade and wait for the acknowledgment.
        let probe = serde_json::to_string(&Packet::Upgrade {
            sid: open.sid.clone(),
        })?;
        if let Err(e) = sink.send(Message::Text(probe.into())).await {
            let _ = sink.close().await;
            return Err(SyncError::with_source(
                ErrorKind::Connect,
                format!("upgrade probe send failed: {e}"),
                e,
            ));
        }

        let grace = Duration::from_millis(open.ping_timeout_ms);
        let acked = tokio::time::timeout(grace, async {
            while let Some(msg) = stream.next().await {
                if let Ok(Message::Text(text)) = msg {
                    if let Ok(Packet::Upgraded) = serde_json::from_str::<Packet>(text.as_str()) {
                        return true;
                    }
                }
            }
            false
        })
        .await;

        match acked {
            Ok(true) => {}
            Ok(false) => {
                let _ = sink.close().await;
                return Err(SyncError::closed("socket closed during upgrade probe"));
            }
            Err(_) => {
                let _ = sink.close().await;
                return Err(SyncError::timeout(format!(
                    "upgrade probe not acknowledged within {grace:?}"
                )));
            }
        }

        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(self.buffer_size);
        let (in_tx, in_rx) = mpsc::channel::<InboundFrame>(self.buffer_size);
        let (control_tx, mut control_rx) = mpsc::channel::<Message>(8);
        let cancel = CancellationToken::new();

        let channel = Channel::from_parts(TransportKind::Framed, out_tx, in_rx, cancel.clone());
        let channel_id = channel.id();
        debug!(channel_id = %channel_id, sid = %open.sid, "framed transport upgraded");

        // Writer: multiplexes outbound events as packets.
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => {
                        if let Ok(text) = serde_json::to_string(&Packet::Close { reason: None }) {
                            let _ = sink.send(Message::Text(text.into())).await;
                        }
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    frame = out_rx.recv() => match frame {
                        Some(frame) => {
                            let packet = Packet::Event { name: frame.name, data: frame.data };
                            match serde_json::to_string(&packet) {
                                Ok(text) => {
                                    if sink.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    error!(channel_id = %channel_id, error = %e, "failed to encode packet");
                                }
                            }
                        }
                        None => break,
                    },
                    control = control_rx.recv() => match control {
                        Some(msg) => {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!(channel_id = %channel_id, "framed writer stopped");
        });

        // Reader: demultiplexes packets, answers keepalives.
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = stream.next() => msg,
                };
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Packet>(text.as_str()) {
                            Ok(Packet::Event { name, data }) => {
                                if in_tx.send(InboundFrame { name, data }).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Packet::Ping) => {
                                if let Ok(pong) = serde_json::to_string(&Packet::Pong) {
                                    let _ = control_tx.send(Message::Text(pong.into())).await;
                                }
                            }
                            Ok(Packet::Close { reason }) => {
                                debug!(channel_id = %channel_id, ?reason, "server closed session");
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(channel_id = %channel_id, error = %e, "skipping malformed packet");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = control_tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(channel_id = %channel_id, error = %e, "framed read error");
                        break;
                    }
                }
            }
            debug!(channel_id = %channel_id, "framed reader stopped");
        });

        Ok(channel)
    }

    /// Runs the session on long-polling.
    fn start_polling(&self, endpoint: &str, token: &str, open: OpenFrame) -> Channel {
        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(self.buffer_size);
        let (in_tx, in_rx) = mpsc::channel::<InboundFrame>(self.buffer_size);
        let cancel = CancellationToken::new();

        let channel = Channel::from_parts(TransportKind::Framed, out_tx, in_rx, cancel.clone());
        let channel_id = channel.id();
        debug!(channel_id = %channel_id, sid = %open.sid, "framed transport on long-polling");

        let poll_url = format!("{endpoint}/realtime/poll");
        let send_url = format!("{endpoint}/realtime/send");
        // A poll is held open for up to a ping interval plus its grace period.
        let poll_timeout = Duration::from_millis(open.ping_interval_ms + open.ping_timeout_ms);

        // Poll loop: drains server packets. Exiting drops `in_tx`, which is
        // the closure signal upstream.
        let http = self.http.clone();
        let sid = open.sid.clone();
        let poll_token = token.to_string();
        let poll_send_url = send_url.clone();
        let poll_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let request = http
                    .get(&poll_url)
                    .query(&[("sid", sid.as_str()), ("token", poll_token.as_str())])
                    .timeout(poll_timeout)
                    .send();
                let result = tokio::select! {
                    _ = poll_cancel.cancelled() => break,
                    result = request => result,
                };
                match result {
                    Ok(response) if response.status().is_success() => {
                        match response.json::<Vec<Packet>>().await {
                            Ok(packets) => {
                                for packet in packets {
                                    match packet {
                                        Packet::Event { name, data } => {
                                            let frame = InboundFrame { name, data };
                                            if in_tx.send(frame).await.is_err() {
                                                return;
                                            }
                                        }
                                        Packet::Ping => {
                                            let _ = http
                                                .post(&poll_send_url)
                                                .query(&[
                                                    ("sid", sid.as_str()),
                                                    ("token", poll_token.as_str()),
                                                ])
                                                .json(&vec![Packet::Pong])
                                                .send()
                                                .await;
                                        }
                                        Packet::Close { reason } => {
                                            debug!(channel_id = %channel_id, ?reason, "server closed session");
                                            return;
                                        }
                                        _ => {}
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(channel_id = %channel_id, error = %e, "malformed poll body");
                                return;
                            }
                        }
                    }
                    Ok(response) => {
                        warn!(channel_id = %channel_id, status = %response.status(), "poll rejected");
                        return;
                    }
                    Err(e) if e.is_timeout() => {
                        // Idle long-poll; ask again.
                        continue;
                    }
                    Err(e) => {
                        debug!(channel_id = %channel_id, error = %e, "poll failed");
                        return;
                    }
                }
            }
            debug!(channel_id = %channel_id, "poll loop stopped");
        });

        // Send loop: posts outbound events back to the session.
        let http = self.http.clone();
        let sid = open.sid;
        let send_token = token.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = http
                            .post(&send_url)
                            .query(&[("sid", sid.as_str()), ("token", send_token.as_str())])
                            .json(&vec![Packet::Close { reason: None }])
                            .send()
                            .await;
                        break;
                    }
                    frame = out_rx.recv() => match frame {
                        Some(frame) => {
                            let packets = vec![Packet::Event { name: frame.name, data: frame.data }];
                            let result = http
                                .post(&send_url)
                                .query(&[("sid", sid.as_str()), ("token", send_token.as_str())])
                                .json(&packets)
                                .send()
                                .await;
                            if let Err(e) = result {
                                warn!(channel_id = %channel_id, error = %e, "outbound post failed");
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!(channel_id = %channel_id, "send loop stopped");
        });

        channel
    }
}

#[async_trait]
impl Transport for FramedTransport {
    fn name(&self) -> &'static str {
        "framed"
    }

    async fn connect(&self, endpoint: &str, token: &str) -> SyncResult<Channel> {
        let open = self.handshake(endpoint, token).await?;

        if open.upgrades.iter().any(|u| u == WEBSOCKET_UPGRADE) {
            match self.try_upgrade(endpoint, token, &open).await {
                Ok(channel) => return Ok(channel),
                Err(e) => {
                    warn!(error = %e, "websocket upgrade failed, staying on long-polling");
                }
            }
        }

        Ok(self.start_polling(endpoint, token, open))
    }
}

fn map_http_error(err: reqwest::Error, what: &str) -> SyncError {
    if err.is_timeout() {
        SyncError::timeout(format!("{what} timed out: {err}"))
    } else if err.is_connect() {
        SyncError::with_source(
            ErrorKind::Connect,
            format!("endpoint unreachable during {what}: {err}"),
            err,
        )
    } else {
        SyncError::with_source(ErrorKind::Connect, format!("{what} failed: {err}"), err)
    }
}
