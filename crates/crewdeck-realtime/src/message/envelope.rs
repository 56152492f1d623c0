//! Event envelope for the raw socket transport.
//!
//! The raw socket is a single duplex channel with no protocol-level
//! multiplexing, so every message is wrapped as `{"type": name, "data":
//! payload}` and inbound messages are demultiplexed by inspecting `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One multiplexed event on the raw socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketEnvelope {
    /// Event name.
    #[serde(rename = "type")]
    pub event: String,
    /// Event payload.
    pub data: Value,
}

impl SocketEnvelope {
    /// Wraps an event for sending.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}
