//! The realtime client: composes the connection manager, event router,
//! presence controller, activity log, conflict registry, and roster into one
//! observable state object plus the outbound intent surface.
//!
//! Instances are explicitly constructed and disposed; independent instances
//! can coexist (one per consumer, or per test).

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crewdeck_core::SyncError;
use crewdeck_core::config::realtime::RealtimeConfig;
use crewdeck_core::events::{ActivityEvent, ConflictAlert, PresenceStatus, UserPresence};
use crewdeck_core::result::SyncResult;

use crate::activity::ActivityLog;
use crate::conflict::ConflictRegistry;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::message::names;
use crate::message::types::{FilePayload, RoomPayload, TypingPayload};
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::presence::{PresenceController, RosterView};
use crate::router::{EventRouter, Subscription};
use crate::transport::{FramedTransport, SocketTransport, Transport};

/// Read-only composite view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeSnapshot {
    /// Connection lifecycle state.
    pub connection: ConnectionState,
    /// Most recent connection-level error, if any.
    pub error: Option<String>,
    /// This client's own presence status.
    pub own_status: PresenceStatus,
    /// Recent activity, newest first.
    pub activities: Vec<ActivityEvent>,
    /// Active conflict alerts, severity-sorted.
    pub conflicts: Vec<ConflictAlert>,
    /// Latest full presence roster.
    pub roster: Vec<UserPresence>,
}

/// The real-time synchronization client.
pub struct RealtimeClient {
    router: Arc<EventRouter>,
    manager: Arc<ConnectionManager>,
    presence: Arc<PresenceController>,
    activity: Arc<ActivityLog>,
    conflicts: Arc<ConflictRegistry>,
    roster: Arc<RosterView>,
    metrics: Arc<ClientMetrics>,
    /// Router registrations owned by this instance, drained on teardown.
    subscriptions: Mutex<Vec<Subscription>>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("connection", &self.manager.state())
            .finish()
    }
}

impl RealtimeClient {
    /// Creates a client with the default transport pair: framed multiplexed
    /// first, raw socket as the fallback.
    pub fn new(config: RealtimeConfig) -> Self {
        let transports: Vec<Arc<dyn Transport>> = vec![
            Arc::new(FramedTransport::new(&config)),
            Arc::new(SocketTransport::new(&config)),
        ];
        Self::with_transports(config, transports)
    }

    /// Creates a client with injected transports (tests, custom stacks).
    pub fn with_transports(config: RealtimeConfig, transports: Vec<Arc<dyn Transport>>) -> Self {
        let metrics = Arc::new(ClientMetrics::new());
        let router = Arc::new(EventRouter::new(metrics.clone()));
        let presence = Arc::new(PresenceController::new(router.clone()));
        let activity = Arc::new(ActivityLog::new(config.activity_capacity));
        let conflicts = Arc::new(ConflictRegistry::new());
        let roster = Arc::new(RosterView::new());
        let manager = Arc::new(ConnectionManager::new(
            config,
            transports,
            router.clone(),
            presence.clone(),
            metrics.clone(),
        ));

        let client = Self {
            router,
            manager,
            presence,
            activity,
            conflicts,
            roster,
            metrics,
            subscriptions: Mutex::new(Vec::new()),
        };
        client.register_inbound_subscriptions();
        info!("realtime client initialized");
        client
    }

    /// Wires the inbound event flow into the local stores.
    fn register_inbound_subscriptions(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let activity = self.activity.clone();
        subscriptions.push(self.router.subscribe(
            names::ACTIVITY_NEW,
            Box::new(move |data| {
                let event: ActivityEvent = serde_json::from_value(data.clone())
                    .map_err(|e| SyncError::handler(format!("malformed activity event: {e}")))?;
                activity.insert(event);
                Ok(())
            }),
        ));

        let roster = self.roster.clone();
        subscriptions.push(self.router.subscribe(
            names::PRESENCE_UPDATE,
            Box::new(move |data| {
                let users: Vec<UserPresence> = serde_json::from_value(data.clone())
                    .map_err(|e| SyncError::handler(format!("malformed presence roster: {e}")))?;
                roster.replace(users);
                Ok(())
            }),
        ));

        let conflicts = self.conflicts.clone();
        subscriptions.push(self.router.subscribe(
            names::CONFLICT_ALERT,
            Box::new(move |data| {
                let alert: ConflictAlert = serde_json::from_value(data.clone())
                    .map_err(|e| SyncError::handler(format!("malformed conflict alert: {e}")))?;
                conflicts.insert(alert);
                Ok(())
            }),
        ));
    }

    /// Establishes the session with a bearer token.
    pub async fn connect(&self, token: &str) -> SyncResult<()> {
        self.manager.connect(token).await
    }

    /// Ends the session; the client can `connect()` again later.
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    /// Current composite view for the presentation layer.
    pub fn snapshot(&self) -> RealtimeSnapshot {
        RealtimeSnapshot {
            connection: self.manager.state(),
            error: self.manager.last_error(),
            own_status: self.presence.status(),
            activities: self.activity.snapshot(),
            conflicts: self.conflicts.view(),
            roster: self.roster.snapshot(),
        }
    }

    /// Observer for connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.watch()
    }

    /// Counters snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The event router, for diagnostic subscribers.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Explicit own-status change.
    pub fn set_status(&self, status: PresenceStatus) {
        self.presence.set_status(status);
    }

    /// Joins a project room.
    pub fn join_project(&self, project_id: &str) {
        self.router.send_payload(
            names::PROJECT_JOIN,
            &RoomPayload {
                project_id: project_id.to_string(),
            },
        );
        self.presence.joined_project(project_id);
    }

    /// Leaves the current project room. A no-op when not in one.
    pub fn leave_project(&self) {
        let Some(project_id) = self.presence.current_project() else {
            debug!("leave_project without a room is a no-op");
            return;
        };
        self.router
            .send_payload(names::PROJECT_LEAVE, &RoomPayload { project_id });
        self.presence.left_project();
    }

    /// Starts editing a file within a room.
    pub fn join_file(&self, project_id: &str, file_path: &str) {
        self.router.send_payload(
            names::FILE_JOIN,
            &FilePayload {
                project_id: project_id.to_string(),
                file_path: file_path.to_string(),
            },
        );
        self.presence.joined_file(project_id, file_path);
    }

    /// Stops editing the current file. A no-op when not in one.
    pub fn leave_file(&self) {
        let Some((project_id, file_path)) = self.presence.current_file() else {
            debug!("leave_file without a file is a no-op");
            return;
        };
        self.router.send_payload(
            names::FILE_LEAVE,
            &FilePayload {
                project_id,
                file_path,
            },
        );
        self.presence.left_file();
    }

    /// Typing indicator on.
    pub fn start_typing(&self, file_path: &str) {
        self.router.send_payload(
            names::TYPING_START,
            &TypingPayload {
                file_path: file_path.to_string(),
            },
        );
    }

    /// Typing indicator off.
    pub fn stop_typing(&self, file_path: &str) {
        self.router.send_payload(
            names::TYPING_STOP,
            &TypingPayload {
                file_path: file_path.to_string(),
            },
        );
    }

    /// Passive tab visibility signal from the host page.
    pub fn report_visibility(&self, hidden: bool) {
        self.presence.report_visibility(hidden);
    }

    /// The host page is about to unload.
    pub fn report_unload(&self) {
        self.presence.report_unload();
    }

    /// Dismisses a conflict alert by id. Absent ids are a no-op.
    pub fn dismiss_conflict(&self, id: &str) {
        self.conflicts.dismiss(id);
    }

    /// Empties the activity history. Connection state is unaffected.
    pub fn clear_activities(&self) {
        self.activity.clear();
    }

    /// Disposes the client: deregisters every router subscription this
    /// instance owns, disconnects, and drops all cached server state.
    ///
    /// Idempotent; a second call finds nothing left to undo.
    pub fn teardown(&self) {
        let drained: Vec<Subscription> = {
            let mut subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            subscriptions.drain(..).collect()
        };
        for subscription in &drained {
            self.router.unsubscribe(subscription);
        }
        self.manager.disconnect();
        self.activity.clear();
        self.conflicts.clear();
        self.roster.clear();
        info!(removed_subscriptions = drained.len(), "realtime client torn down");
    }
}
