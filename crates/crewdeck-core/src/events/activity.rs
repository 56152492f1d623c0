//! Team activity events (commits, deployments, collaboration signals).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A commit was pushed.
    Commit,
    /// A deployment ran.
    Deployment,
    /// A collaboration action (comment, review, share).
    Collaboration,
    /// A conflict was detected.
    Conflict,
    /// A presence change worth surfacing in the feed.
    Presence,
}

/// A single activity feed entry.
///
/// Immutable once constructed. Identity is `id`; ids are server-assigned and
/// causally ordered, and the client stores them as delivered without
/// deduplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Server-assigned unique identifier.
    pub id: String,
    /// Event category.
    pub kind: ActivityKind,
    /// Acting user's identifier.
    pub actor_id: String,
    /// Acting user's display name.
    pub actor_name: String,
    /// Acting user's avatar URL, if any.
    #[serde(default)]
    pub actor_avatar: Option<String>,
    /// Project the event belongs to.
    pub project_id: String,
    /// Project display name.
    pub project_name: String,
    /// Human-readable event description.
    pub message: String,
    /// When the event occurred (server clock).
    pub occurred_at: DateTime<Utc>,
    /// Opaque event-specific metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}
