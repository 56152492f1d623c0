//! Connection lifecycle: state machine, backoff policy, and the manager
//! that owns the transport channel.

pub mod backoff;
pub mod manager;

use serde::{Deserialize, Serialize};

pub use backoff::BackoffSchedule;
pub use manager::ConnectionManager;

/// Lifecycle state of the connection to the collaboration server.
///
/// Exactly one value at a time, owned exclusively by the connection
/// manager; every other component only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session; `connect()` starts one.
    Disconnected,
    /// Initial negotiation in flight.
    Connecting,
    /// Live channel established.
    Connected,
    /// Channel lost; automatic attempts in progress.
    Reconnecting,
    /// Negotiation or reconnection gave up; a fresh `connect()` is needed.
    Failed,
}

impl ConnectionState {
    /// Short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}
