//! Packet grammar of the framed multiplexed transport.
//!
//! The framed transport negotiates a session over HTTP, optionally upgrades
//! to a WebSocket, and otherwise long-polls. Both legs speak the same
//! self-describing packet set. Packet fields are transport-internal and use
//! snake_case; event payloads inside [`Packet::Event`] keep the server's
//! camelCase contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session parameters returned by the open handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFrame {
    /// Server-assigned session id.
    pub sid: String,
    /// Transports the session may upgrade to (e.g. `"websocket"`).
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server keepalive ping interval.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    /// Grace period after a ping before the session is considered dead.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    10_000
}

/// One framed-transport packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packet {
    /// Handshake reply opening a session.
    Open(OpenFrame),
    /// Client probe asking to move the session onto the socket leg.
    Upgrade {
        /// Session being upgraded.
        sid: String,
    },
    /// Server acknowledgment of an upgrade probe.
    Upgraded,
    /// Server keepalive.
    Ping,
    /// Client keepalive reply.
    Pong,
    /// A multiplexed application event.
    Event {
        /// Event name.
        name: String,
        /// Event payload.
        data: Value,
    },
    /// Session close.
    Close {
        /// Optional close reason.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}
