//! Own-presence controller.
//!
//! Maintains this client's presence state machine and emits transitions as
//! outbound `presence:update` events. Other users' presence is inbound-only
//! and lives in [`super::RosterView`]. Passive browser signals (tab
//! visibility, page unload) arrive as explicit method calls so the machine
//! is testable without a browser.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crewdeck_core::events::PresenceStatus;

use crate::message::names;
use crate::message::types::PresencePayload;
use crate::router::EventRouter;

/// Locally cached own presence.
#[derive(Debug, Clone)]
struct OwnPresence {
    status: PresenceStatus,
    project_id: Option<String>,
    file_path: Option<String>,
}

/// Drives the local user's presence state machine.
pub struct PresenceController {
    router: Arc<EventRouter>,
    state: Mutex<OwnPresence>,
}

impl std::fmt::Debug for PresenceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceController").finish()
    }
}

impl PresenceController {
    /// Creates the controller in the `offline` state.
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self {
            router,
            state: Mutex::new(OwnPresence {
                status: PresenceStatus::Offline,
                project_id: None,
                file_path: None,
            }),
        }
    }

    /// Last-known own status, from the local cache.
    pub fn status(&self) -> PresenceStatus {
        self.lock().status
    }

    /// Project room the client is currently in, if any.
    pub fn current_project(&self) -> Option<String> {
        self.lock().project_id.clone()
    }

    /// File context the client is currently in, as (project, file).
    pub fn current_file(&self) -> Option<(String, String)> {
        let state = self.lock();
        match (&state.project_id, &state.file_path) {
            (Some(project), Some(file)) => Some((project.clone(), file.clone())),
            _ => None,
        }
    }

    /// The connection was (re)established: announce a global `online`.
    ///
    /// Prior room/file context is not restored automatically.
    pub fn handle_connected(&self) {
        self.transition(PresenceStatus::Online, None, None);
    }

    /// Explicit status change requested by the consumer, keeping context.
    pub fn set_status(&self, status: PresenceStatus) {
        let (project_id, file_path) = {
            let state = self.lock();
            (state.project_id.clone(), state.file_path.clone())
        };
        self.transition(status, project_id, file_path);
    }

    /// The consumer entered a project room.
    pub fn joined_project(&self, project_id: &str) {
        self.transition(PresenceStatus::Online, Some(project_id.to_string()), None);
    }

    /// The consumer left its project room.
    pub fn left_project(&self) {
        self.transition(PresenceStatus::Online, None, None);
    }

    /// The consumer started editing a file within a room.
    pub fn joined_file(&self, project_id: &str, file_path: &str) {
        self.transition(
            PresenceStatus::Busy,
            Some(project_id.to_string()),
            Some(file_path.to_string()),
        );
    }

    /// The consumer stopped editing a file: revert to room-level presence.
    pub fn left_file(&self) {
        let project_id = self.lock().project_id.clone();
        self.transition(PresenceStatus::Online, project_id, None);
    }

    /// Passive visibility signal from the host page.
    ///
    /// Repeated identical signals emit nothing; each actual transition emits
    /// exactly once. Returning to visible announces a global `online` and
    /// does not restore prior room/file context.
    pub fn report_visibility(&self, hidden: bool) {
        let status = self.status();
        if hidden {
            if status == PresenceStatus::Away {
                debug!("ignoring repeated hidden signal");
                return;
            }
            let (project_id, file_path) = {
                let state = self.lock();
                (state.project_id.clone(), state.file_path.clone())
            };
            self.transition(PresenceStatus::Away, project_id, file_path);
        } else {
            if status != PresenceStatus::Away {
                debug!("ignoring visible signal outside away state");
                return;
            }
            self.transition(PresenceStatus::Online, None, None);
        }
    }

    /// The host page is about to unload: best-effort `offline`.
    ///
    /// No acknowledgment is awaited; the emission is dropped silently when
    /// the channel is already gone.
    pub fn report_unload(&self) {
        self.transition(PresenceStatus::Offline, None, None);
    }

    /// Applies a transition to the local cache and emits it.
    fn transition(
        &self,
        status: PresenceStatus,
        project_id: Option<String>,
        file_path: Option<String>,
    ) {
        {
            let mut state = self.lock();
            state.status = status;
            state.project_id = project_id.clone();
            state.file_path = file_path.clone();
        }
        let payload = PresencePayload {
            status,
            project_id,
            file_path,
        };
        // Dropped by the router when disconnected; presence intents are
        // allowed to be no-ops then.
        self.router.send_payload(names::PRESENCE_UPDATE, &payload);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OwnPresence> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
