//! Transport adapters: one contract, two interchangeable wire strategies.
//!
//! [`negotiate`] tries the framed multiplexed transport first and falls back
//! to the raw socket transport at most once per connection attempt.

pub mod framed;
pub mod socket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crewdeck_core::{SyncError, SyncResult};

pub use framed::FramedTransport;
pub use socket::SocketTransport;

/// Which wire strategy a channel is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// HTTP handshake + websocket upgrade or long-polling.
    Framed,
    /// Single raw WebSocket.
    Socket,
}

impl TransportKind {
    /// Short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Framed => "framed",
            Self::Socket => "socket",
        }
    }
}

/// An inbound event frame, already demultiplexed by the transport.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// Event name.
    pub name: String,
    /// Event payload.
    pub data: Value,
}

/// An outbound event frame, not yet encoded for the wire.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Event name.
    pub name: String,
    /// Event payload.
    pub data: Value,
}

/// A live, established channel to the collaboration server.
///
/// Backed by transport tasks that own the actual socket. The inbound
/// receiver is taken once by the connection manager; the transport signals
/// remote closure by dropping its inbound sender.
#[derive(Debug)]
pub struct Channel {
    id: Uuid,
    kind: TransportKind,
    outbound: mpsc::Sender<OutboundFrame>,
    inbound: Option<mpsc::Receiver<InboundFrame>>,
    cancel: CancellationToken,
}

impl Channel {
    /// Assembles a channel from its plumbing. Used by transport
    /// implementations and by test doubles.
    pub fn from_parts(
        kind: TransportKind,
        outbound: mpsc::Sender<OutboundFrame>,
        inbound: mpsc::Receiver<InboundFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            outbound,
            inbound: Some(inbound),
            cancel,
        }
    }

    /// Channel id for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wire strategy this channel runs on.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Queue an outbound event without blocking.
    ///
    /// Returns `false` if the frame was dropped (buffer full or channel
    /// already closed).
    pub fn send(&self, name: impl Into<String>, data: Value) -> bool {
        let frame = OutboundFrame {
            name: name.into(),
            data,
        };
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(channel_id = %self.id, "send buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(channel_id = %self.id, "send on closed channel, dropping frame");
                false
            }
        }
    }

    /// Clone of the outbound sender, for binding into the event router.
    pub fn sender(&self) -> mpsc::Sender<OutboundFrame> {
        self.outbound.clone()
    }

    /// Takes the inbound receiver. Yields `None` on the second call.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<InboundFrame>> {
        self.inbound.take()
    }

    /// Tears the channel down: transport tasks observe the cancellation and
    /// close the underlying socket best-effort.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// A wire strategy able to establish a [`Channel`].
///
/// Implementations must not leave a half-open socket behind a failed
/// `connect`: any partially-opened resource is closed before the error is
/// returned.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Establish a channel to `endpoint`, authenticating with `token`.
    async fn connect(&self, endpoint: &str, token: &str) -> SyncResult<Channel>;
}

/// Tries each transport in order, each at most once, first success wins.
///
/// Any failure of an earlier transport (auth rejection included) falls
/// through to the next; when all fail, the last error is surfaced.
pub async fn negotiate(
    transports: &[Arc<dyn Transport>],
    endpoint: &str,
    token: &str,
    connect_timeout: Duration,
) -> SyncResult<Channel> {
    let mut last_err: Option<SyncError> = None;

    for transport in transports {
        debug!(transport = transport.name(), endpoint, "attempting transport");
        match tokio::time::timeout(connect_timeout, transport.connect(endpoint, token)).await {
            Ok(Ok(channel)) => {
                info!(
                    transport = transport.name(),
                    channel_id = %channel.id(),
                    "transport established"
                );
                return Ok(channel);
            }
            Ok(Err(e)) => {
                warn!(transport = transport.name(), error = %e, "transport failed");
                last_err = Some(e);
            }
            Err(_) => {
                warn!(transport = transport.name(), "transport connect timed out");
                last_err = Some(SyncError::timeout(format!(
                    "{} connect timed out after {connect_timeout:?}",
                    transport.name()
                )));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| SyncError::connect("no transports configured")))
}

/// Rewrites an HTTP endpoint into its WebSocket counterpart.
pub(crate) fn ws_endpoint(endpoint: &str) -> String {
    if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ws_endpoint_rewrites_scheme() {
        assert_eq!(ws_endpoint("http://host:4000"), "ws://host:4000");
        assert_eq!(ws_endpoint("https://host"), "wss://host");
        assert_eq!(ws_endpoint("ws://host"), "ws://host");
    }

    #[tokio::test]
    async fn test_channel_send_and_close() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (_in_tx, in_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let channel = Channel::from_parts(TransportKind::Socket, out_tx, in_rx, cancel.clone());

        assert!(channel.send("typing:start", json!({"filePath": "a.rs"})));
        let frame = out_rx.recv().await.unwrap();
        assert_eq!(frame.name, "typing:start");

        channel.close();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_channel_send_after_receiver_dropped_reports_drop() {
        let (out_tx, out_rx) = mpsc::channel(4);
        let (_in_tx, in_rx) = mpsc::channel(4);
        let channel = Channel::from_parts(
            TransportKind::Socket,
            out_tx,
            in_rx,
            CancellationToken::new(),
        );
        drop(out_rx);

        assert!(!channel.send("typing:stop", json!({})));
    }

    #[tokio::test]
    async fn test_take_inbound_is_take_once() {
        let (out_tx, _out_rx) = mpsc::channel(4);
        let (_in_tx, in_rx) = mpsc::channel(4);
        let mut channel = Channel::from_parts(
            TransportKind::Framed,
            out_tx,
            in_rx,
            CancellationToken::new(),
        );

        assert!(channel.take_inbound().is_some());
        assert!(channel.take_inbound().is_none());
    }
}
