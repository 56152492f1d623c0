//! Outbound payload shapes for client intents.
//!
//! Field names follow the server's JSON contract (camelCase). Optional
//! context fields are omitted entirely when absent rather than sent as null.

use serde::{Deserialize, Serialize};

use crewdeck_core::events::PresenceStatus;

/// Payload of an outbound `presence:update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    /// New own status.
    pub status: PresenceStatus,
    /// Project context, if the status is scoped to a room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// File context, if the status is scoped to a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Payload of `project:join` / `project:leave`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    /// Target project room.
    pub project_id: String,
}

/// Payload of `file:join` / `file:leave`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    /// Project room the file belongs to.
    pub project_id: String,
    /// File being edited.
    pub file_path: String,
}

/// Payload of `typing:start` / `typing:stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    /// File the typing indicator refers to.
    pub file_path: String,
}
