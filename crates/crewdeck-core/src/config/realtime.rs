//! Real-time sync client configuration.

use serde::{Deserialize, Serialize};

/// Real-time sync client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Base endpoint of the collaboration server, e.g. `http://host:port`.
    pub endpoint: String,
    /// Connect/handshake timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Base reconnection delay in milliseconds; attempt N waits N times this.
    #[serde(default = "default_base_delay")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum consecutive reconnection attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub reconnect_max_attempts: u32,
    /// Capacity of the bounded activity history.
    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,
    /// Internal channel buffer size for transport frame queues.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
}

impl RealtimeConfig {
    /// A configuration pointing at the given endpoint with all defaults.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout_seconds: default_connect_timeout(),
            reconnect_base_delay_ms: default_base_delay(),
            reconnect_max_attempts: default_max_attempts(),
            activity_capacity: default_activity_capacity(),
            channel_buffer_size: default_channel_buffer(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_activity_capacity() -> usize {
    50
}

fn default_channel_buffer() -> usize {
    256
}
