//! User presence status and roster records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's availability status as broadcast to the team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Active in the workspace.
    Online,
    /// Actively editing a specific file.
    Busy,
    /// Connected but not looking.
    Away,
    /// Not connected.
    Offline,
}

impl PresenceStatus {
    /// Parses from a string with a default fallback.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "online" => Self::Online,
            "busy" => Self::Busy,
            "away" => Self::Away,
            "offline" => Self::Offline,
            _ => Self::Online,
        }
    }

    /// Converts to the wire string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Busy => "busy",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }
}

/// One roster entry in a presence snapshot.
///
/// The server replaces the full roster wholesale on each `presence:update`
/// push; entries are never merged incrementally on the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    /// User identifier.
    pub user_id: String,
    /// Display name.
    pub user_name: String,
    /// Avatar URL, if any.
    #[serde(default)]
    pub user_avatar: Option<String>,
    /// Current availability.
    pub status: PresenceStatus,
    /// Project the user is currently in, if any.
    #[serde(default)]
    pub current_project_id: Option<String>,
    /// File the user is currently editing, if any.
    #[serde(default)]
    pub current_file_path: Option<String>,
    /// Last time the server saw the user.
    pub last_seen_at: DateTime<Utc>,
}
