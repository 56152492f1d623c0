//! Collaboration conflict alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of collaboration hazard the server detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// A merge produced conflicting hunks.
    MergeConflict,
    /// A file is locked by another user.
    FileLock,
    /// Two users are editing the same file.
    SimultaneousEdit,
}

/// Alert severity.
///
/// Variant order is the sort order of the derived conflict view: `High`
/// sorts before `Medium` sorts before `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Needs attention now.
    High,
    /// Worth a look soon.
    Medium,
    /// Informational.
    Low,
}

/// A server-detected collaboration hazard.
///
/// Lives in the conflict registry until explicitly dismissed by id; alerts
/// never expire automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAlert {
    /// Server-assigned unique identifier.
    pub id: String,
    /// Hazard category.
    pub kind: ConflictKind,
    /// Project the conflict belongs to.
    pub project_id: String,
    /// Project display name.
    pub project_name: String,
    /// File the conflict is about.
    pub file_path: String,
    /// Names of the users involved, in server order.
    pub involved_users: Vec<String>,
    /// Alert severity.
    pub severity: Severity,
    /// Optional resolution suggestion.
    #[serde(default)]
    pub suggestion: Option<String>,
    /// When the conflict was detected.
    pub occurred_at: DateTime<Utc>,
}
