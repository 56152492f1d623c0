//! Inbound presence roster.
//!
//! The server is the source of truth for the roster: every `presence:update`
//! push replaces the full known-user set wholesale, never merging
//! incrementally. During reconnection the last snapshot is kept as-is
//! (stale, not retracted).

use std::sync::RwLock;

use crewdeck_core::events::UserPresence;

/// The most recent full presence roster snapshot.
#[derive(Debug, Default)]
pub struct RosterView {
    users: RwLock<Vec<UserPresence>>,
}

impl RosterView {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the full roster with a new snapshot.
    pub fn replace(&self, users: Vec<UserPresence>) {
        *self.users.write().unwrap_or_else(|e| e.into_inner()) = users;
    }

    /// Clones the current snapshot.
    pub fn snapshot(&self) -> Vec<UserPresence> {
        self.users.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the snapshot (teardown only).
    pub fn clear(&self) {
        self.users.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
