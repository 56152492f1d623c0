//! Fixed-capacity, newest-first activity buffer.

use std::collections::VecDeque;
use std::sync::Mutex;

use crewdeck_core::events::ActivityEvent;

/// Bounded ring buffer of recently observed activity, newest first.
///
/// Every inbound event is prepended and the tail is trimmed back to
/// capacity. There is no deduplication by id: ids are server-assigned and
/// assumed unique, so a duplicate delivery is stored twice.
#[derive(Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEvent>>,
}

impl ActivityLog {
    /// Creates an empty log with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Prepends an event, evicting the oldest entries beyond capacity.
    pub fn insert(&self, event: ActivityEvent) {
        let mut entries = self.lock();
        entries.push_front(event);
        entries.truncate(self.capacity);
    }

    /// Clones the current contents, newest first.
    pub fn snapshot(&self) -> Vec<ActivityEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Empties the buffer. Connection state is unaffected.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ActivityEvent>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
