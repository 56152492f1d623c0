//! Event router: typed publish/subscribe for inbound events and the
//! outbound pass-through to the active channel.
//!
//! Registration returns an opaque [`Subscription`] handle; removal is by
//! handle, so independent consumers of the same event name never disturb
//! each other. Dispatch is synchronous and in registration order, and a
//! failing handler never blocks delivery to the handlers after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crewdeck_core::SyncResult;

use crate::metrics::ClientMetrics;
use crate::transport::OutboundFrame;

/// An inbound event subscriber.
pub type EventHandler = Box<dyn Fn(&Value) -> SyncResult<()> + Send + Sync>;

/// Handle identifying one registration. Required for unsubscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    event: String,
    id: u64,
}

impl Subscription {
    /// Event name this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }
}

/// Routes inbound frames to subscribers and outbound intents to the channel.
pub struct EventRouter {
    /// Event name to handlers, in registration order.
    handlers: RwLock<HashMap<String, Vec<(u64, EventHandler)>>>,
    /// Monotonic subscription id source.
    next_id: AtomicU64,
    /// Outbound sender of the active channel, when connected.
    outbound: RwLock<Option<mpsc::Sender<OutboundFrame>>>,
    /// Shared counters.
    metrics: Arc<ClientMetrics>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter").finish()
    }
}

impl EventRouter {
    /// Creates an empty router.
    pub fn new(metrics: Arc<ClientMetrics>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            outbound: RwLock::new(None),
            metrics,
        }
    }

    /// Registers a handler for an event name.
    pub fn subscribe(&self, event: &str, handler: EventHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        Subscription {
            event: event.to_string(),
            id,
        }
    }

    /// Removes exactly the registration behind `subscription`.
    ///
    /// Unknown or already-removed handles are a no-op.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = handlers.get_mut(&subscription.event) {
            entries.retain(|(id, _)| *id != subscription.id);
            if entries.is_empty() {
                handlers.remove(&subscription.event);
            }
        }
    }

    /// Number of live registrations for an event name.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Delivers an inbound frame to every subscriber of its event name.
    ///
    /// Handlers run synchronously in registration order; a failing handler
    /// is logged and counted, and delivery continues. Handlers must not
    /// register or remove subscriptions from inside dispatch.
    pub fn dispatch(&self, event: &str, data: &Value) {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = handlers.get(event) else {
            debug!(event, "no subscribers for inbound event");
            return;
        };
        for (id, handler) in entries {
            if let Err(e) = handler(data) {
                self.metrics.inc_handler_errors();
                error!(event, subscription_id = id, error = %e, "event handler failed");
            }
        }
    }

    /// Passes an outbound event through to the active channel.
    ///
    /// There is no buffering: when no channel is bound the frame is dropped.
    pub fn send(&self, event: &str, data: Value) -> bool {
        let outbound = self.outbound.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = outbound.as_ref() else {
            debug!(event, "dropping outbound event, not connected");
            self.metrics.inc_dropped();
            return false;
        };
        let frame = OutboundFrame {
            name: event.to_string(),
            data,
        };
        match sender.try_send(frame) {
            Ok(()) => {
                self.metrics.inc_sent();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(event, "outbound buffer full, dropping event");
                self.metrics.inc_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(event, "dropping outbound event, channel closed");
                self.metrics.inc_dropped();
                false
            }
        }
    }

    /// Serializes a payload and passes it through to the active channel.
    pub fn send_payload<T: Serialize>(&self, event: &str, payload: &T) -> bool {
        match serde_json::to_value(payload) {
            Ok(data) => self.send(event, data),
            Err(e) => {
                error!(event, error = %e, "failed to serialize outbound payload");
                false
            }
        }
    }

    /// Binds the active channel's outbound sender.
    pub fn bind(&self, sender: mpsc::Sender<OutboundFrame>) {
        *self.outbound.write().unwrap_or_else(|e| e.into_inner()) = Some(sender);
    }

    /// Unbinds the outbound sender; subsequent sends drop.
    pub fn unbind(&self) {
        *self.outbound.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
