//! Connection manager: owns the transport channel and the connection state
//! machine, detects failures, and drives backoff-based reconnection.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crewdeck_core::config::realtime::RealtimeConfig;
use crewdeck_core::{SyncError, SyncResult};

use crate::metrics::ClientMetrics;
use crate::presence::PresenceController;
use crate::router::EventRouter;
use crate::transport::{Channel, Transport, negotiate};

use super::{BackoffSchedule, ConnectionState};

/// Handle onto a running session, kept so `disconnect()` can cancel it.
#[derive(Debug)]
struct SessionHandle {
    cancel: CancellationToken,
}

/// Why the reconnection loop stopped.
enum ReconnectOutcome {
    /// A fresh channel was negotiated.
    Connected(Channel),
    /// A local `disconnect()` short-circuited the loop.
    Cancelled,
    /// All attempts failed, or the token was rejected.
    Exhausted(SyncError),
}

/// Owns the transport channel lifecycle for one client instance.
///
/// The channel is exclusively owned by one manager at a time. All other
/// components observe [`ConnectionState`] through [`ConnectionManager::watch`]
/// and never mutate it.
pub struct ConnectionManager {
    config: RealtimeConfig,
    transports: Vec<Arc<dyn Transport>>,
    router: Arc<EventRouter>,
    presence: Arc<PresenceController>,
    metrics: Arc<ClientMetrics>,
    backoff: BackoffSchedule,
    state_tx: watch::Sender<ConnectionState>,
    session: Mutex<Option<SessionHandle>>,
    /// Last-known-good token, reused by reconnection attempts.
    token: Mutex<Option<String>>,
    /// Most recent connection-level error, for the snapshot's error field.
    last_error: RwLock<Option<String>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager in the `Disconnected` state.
    pub fn new(
        config: RealtimeConfig,
        transports: Vec<Arc<dyn Transport>>,
        router: Arc<EventRouter>,
        presence: Arc<PresenceController>,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        let backoff = BackoffSchedule::from_config(&config);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            transports,
            router,
            presence,
            metrics,
            backoff,
            state_tx,
            session: Mutex::new(None),
            token: Mutex::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observer for connection state transitions.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Most recent connection-level error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Establishes a session with the given bearer token.
    ///
    /// Idempotent while `Connected`: a second call returns without
    /// renegotiating. While an attempt is already in flight the call is
    /// rejected without disturbing that attempt.
    pub async fn connect(self: &Arc<Self>, token: &str) -> SyncResult<()> {
        match self.state() {
            ConnectionState::Connected => {
                debug!("connect() while connected is a no-op");
                return Ok(());
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                return Err(SyncError::connect("connection attempt already in progress"));
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {}
        }

        let cancel = CancellationToken::new();
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(SessionHandle {
            cancel: cancel.clone(),
        });
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        self.set_state(ConnectionState::Connecting);
        info!(endpoint = %self.config.endpoint, "connecting");

        let result = negotiate(
            &self.transports,
            &self.config.endpoint,
            token,
            self.connect_timeout(),
        )
        .await;

        if cancel.is_cancelled() {
            // disconnect() raced the handshake; never keep the channel.
            if let Ok(channel) = result {
                channel.close();
            }
            return Err(SyncError::closed("disconnected during connect"));
        }

        match result {
            Ok(channel) => {
                self.metrics.inc_connects();
                self.install(channel, cancel);
                Ok(())
            }
            Err(e) => {
                *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
                self.record_error(&e);
                self.set_state(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    /// Ends the session from any state. Terminal for the session: resuming
    /// requires a fresh `connect()`.
    ///
    /// Safe to call while `Connecting` or `Reconnecting`; any pending
    /// backoff timer is short-circuited. Emits a best-effort `offline`
    /// before closing the channel.
    pub fn disconnect(&self) {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner()).take();
        match session {
            Some(session) => {
                self.presence.report_unload();
                session.cancel.cancel();
                self.router.unbind();
                self.set_state(ConnectionState::Disconnected);
                info!("disconnected");
            }
            None => {
                if self.state() != ConnectionState::Disconnected {
                    self.set_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connect_timeout_seconds)
    }

    /// Binds a freshly negotiated channel and starts its session task.
    fn install(self: &Arc<Self>, channel: Channel, cancel: CancellationToken) {
        self.router.bind(channel.sender());
        self.clear_error();
        self.set_state(ConnectionState::Connected);
        self.presence.handle_connected();
        info!(channel_id = %channel.id(), transport = channel.kind().as_str(), "connected");

        let manager = Arc::clone(self);
        tokio::spawn(manager.run_session(channel, cancel));
    }

    /// Pumps inbound frames into the router and reconnects on remote
    /// closure, for as long as the session lives.
    async fn run_session(self: Arc<Self>, mut channel: Channel, cancel: CancellationToken) {
        loop {
            let Some(mut inbound) = channel.take_inbound() else {
                warn!(channel_id = %channel.id(), "channel inbound already taken");
                return;
            };

            let remote_closed = loop {
                tokio::select! {
                    _ = cancel.cancelled() => break false,
                    frame = inbound.recv() => match frame {
                        Some(frame) => {
                            self.metrics.inc_received();
                            self.router.dispatch(&frame.name, &frame.data);
                        }
                        None => break true,
                    },
                }
            };

            channel.close();
            self.router.unbind();

            if !remote_closed {
                // Local disconnect() owns the state transition.
                debug!(channel_id = %channel.id(), "session ended locally");
                return;
            }

            warn!(channel_id = %channel.id(), "transport closed by remote");
            self.record_error(&SyncError::closed("transport closed by remote"));
            self.set_state(ConnectionState::Reconnecting);

            match self.reconnect(&cancel).await {
                ReconnectOutcome::Connected(new_channel) => {
                    self.metrics.inc_reconnects();
                    self.router.bind(new_channel.sender());
                    self.clear_error();
                    self.set_state(ConnectionState::Connected);
                    self.presence.handle_connected();
                    info!(
                        channel_id = %new_channel.id(),
                        transport = new_channel.kind().as_str(),
                        "reconnected"
                    );
                    channel = new_channel;
                }
                ReconnectOutcome::Cancelled => {
                    debug!("reconnection cancelled by local disconnect");
                    return;
                }
                ReconnectOutcome::Exhausted(e) => {
                    *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
                    self.record_error(&e);
                    self.set_state(ConnectionState::Failed);
                    warn!(error = %e, "reconnection gave up");
                    return;
                }
            }
        }
    }

    /// Runs capped backoff attempts with the last-known-good token.
    async fn reconnect(&self, cancel: &CancellationToken) -> ReconnectOutcome {
        let token = self.token.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let Some(token) = token else {
            return ReconnectOutcome::Exhausted(SyncError::connect(
                "no credentials for reconnection",
            ));
        };

        let mut last_err = SyncError::connect("reconnection never attempted");
        for attempt in 1..=self.backoff.max_attempts() {
            let delay = self.backoff.delay_for(attempt);
            debug!(attempt, ?delay, "scheduling reconnection attempt");
            tokio::select! {
                _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }

            match negotiate(
                &self.transports,
                &self.config.endpoint,
                &token,
                self.connect_timeout(),
            )
            .await
            {
                Ok(channel) => {
                    if cancel.is_cancelled() {
                        channel.close();
                        return ReconnectOutcome::Cancelled;
                    }
                    return ReconnectOutcome::Connected(channel);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reconnection attempt failed");
                    let token_rejected = e.is_auth();
                    last_err = e;
                    if token_rejected {
                        // The token has been invalidated; retrying cannot help.
                        info!("token no longer valid, abandoning reconnection");
                        break;
                    }
                }
            }
        }

        ReconnectOutcome::Exhausted(last_err)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = *self.state_tx.borrow();
        if previous != state {
            debug!(
                from = previous.as_str(),
                to = state.as_str(),
                "connection state changed"
            );
        }
        self.state_tx.send_replace(state);
    }

    fn record_error(&self, error: &SyncError) {
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = Some(error.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
