//! Raw bidirectional socket transport.
//!
//! A single duplex WebSocket with no protocol-level multiplexing: the
//! adapter wraps every outbound payload in a [`SocketEnvelope`] and
//! demultiplexes inbound messages by their `type` field. The bearer token is
//! appended as a query credential.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crewdeck_core::config::realtime::RealtimeConfig;
use crewdeck_core::error::ErrorKind;
use crewdeck_core::{SyncError, SyncResult};

use crate::message::SocketEnvelope;

use super::{Channel, InboundFrame, OutboundFrame, Transport, TransportKind, ws_endpoint};

/// The raw socket wire strategy.
#[derive(Debug)]
pub struct SocketTransport {
    buffer_size: usize,
}

impl SocketTransport {
    /// Creates the transport from client configuration.
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            buffer_size: config.channel_buffer_size,
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn connect(&self, endpoint: &str, token: &str) -> SyncResult<Channel> {
        let url = format!("{}/ws?token={}", ws_endpoint(endpoint), token);
        let (stream, _response) = connect_async(&url).await.map_err(map_connect_error)?;
        let (mut sink, mut stream) = stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(self.buffer_size);
        let (in_tx, in_rx) = mpsc::channel::<InboundFrame>(self.buffer_size);
        let (control_tx, mut control_rx) = mpsc::channel::<Message>(8);
        let cancel = CancellationToken::new();

        let channel = Channel::from_parts(TransportKind::Socket, out_tx, in_rx, cancel.clone());
        let channel_id = channel.id();
        debug!(channel_id = %channel_id, "raw socket connected");

        // Writer: encodes outbound frames and forwards control replies.
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    frame = out_rx.recv() => match frame {
                        Some(frame) => {
                            let envelope = SocketEnvelope::new(frame.name, frame.data);
                            match serde_json::to_string(&envelope) {
                                Ok(text) => {
                                    if sink.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    error!(channel_id = %channel_id, error = %e, "failed to encode frame");
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
            debug!(channel_id = %channel_id, "socket writer stopped");
        });

        // Reader: demultiplexes inbound envelopes, answers protocol pings.
        // Dropping `in_tx` on exit is the closure signal upstream.
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = stream.next() => msg,
                };
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SocketEnvelope>(text.as_str()) {
                            Ok(envelope) => {
                                let frame = InboundFrame {
                                    name: envelope.event,
                                    data: envelope.data,
                                };
                                if in_tx.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(channel_id = %channel_id, error = %e, "skipping malformed frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = control_tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(channel_id = %channel_id, error = %e, "socket read error");
                        break;
                    }
                }
            }
            debug!(channel_id = %channel_id, "socket reader stopped");
        });

        Ok(channel)
    }
}

fn map_connect_error(err: tungstenite::Error) -> SyncError {
    match &err {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            SyncError::auth(format!(
                "websocket upgrade rejected: {}",
                response.status()
            ))
        }
        _ => SyncError::with_source(
            ErrorKind::Connect,
            format!("websocket connect failed: {err}"),
            err,
        ),
    }
}
