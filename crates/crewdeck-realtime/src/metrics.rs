//! Sync client metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Client-level metrics counters.
#[derive(Debug)]
pub struct ClientMetrics {
    /// Successful initial connects
    pub connects_total: AtomicU64,
    /// Successful reconnects
    pub reconnects_total: AtomicU64,
    /// Outbound frames handed to a transport
    pub frames_sent: AtomicU64,
    /// Inbound frames dispatched
    pub frames_received: AtomicU64,
    /// Outbound frames dropped (no channel, or buffer full)
    pub frames_dropped: AtomicU64,
    /// Subscriber failures during dispatch
    pub handler_errors: AtomicU64,
}

impl ClientMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self {
            connects_total: AtomicU64::new(0),
            reconnects_total: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
        }
    }

    /// Record a successful connect
    pub fn inc_connects(&self) {
        self.connects_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful reconnect
    pub fn inc_reconnects(&self) {
        self.reconnects_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an outbound frame
    pub fn inc_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inbound frame
    pub fn inc_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped outbound frame
    pub fn inc_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a subscriber failure
    pub fn inc_handler_errors(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects_total: self.connects_total.load(Ordering::Relaxed),
            reconnects_total: self.reconnects_total.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Successful initial connects
    pub connects_total: u64,
    /// Successful reconnects
    pub reconnects_total: u64,
    /// Outbound frames handed to a transport
    pub frames_sent: u64,
    /// Inbound frames dispatched
    pub frames_received: u64,
    /// Outbound frames dropped
    pub frames_dropped: u64,
    /// Subscriber failures during dispatch
    pub handler_errors: u64,
}
