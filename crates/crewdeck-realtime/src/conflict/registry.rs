//! Registry of currently active conflict alerts.

use dashmap::DashMap;

use crewdeck_core::events::ConflictAlert;

/// Conflict alerts keyed by id, with a severity-sorted derived view.
///
/// Alerts stay until explicitly dismissed; nothing expires automatically.
#[derive(Debug, Default)]
pub struct ConflictRegistry {
    alerts: DashMap<String, ConflictAlert>,
}

impl ConflictRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an alert. A duplicate id replaces the existing entry.
    pub fn insert(&self, alert: ConflictAlert) {
        self.alerts.insert(alert.id.clone(), alert);
    }

    /// Removes the alert with the given id. Absent ids are a no-op.
    pub fn dismiss(&self, id: &str) {
        self.alerts.remove(id);
    }

    /// Derived sorted view: severity first (high before medium before low),
    /// most recent first within a severity.
    pub fn view(&self) -> Vec<ConflictAlert> {
        let mut alerts: Vec<ConflictAlert> =
            self.alerts.iter().map(|entry| entry.value().clone()).collect();
        alerts.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then(b.occurred_at.cmp(&a.occurred_at))
        });
        alerts
    }

    /// Number of active alerts.
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Whether there are no active alerts.
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Drops every alert (teardown only).
    pub fn clear(&self) {
        self.alerts.clear();
    }
}
