//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod http;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crewdeck_core::config::realtime::RealtimeConfig;
use crewdeck_core::{SyncError, SyncResult};
use crewdeck_realtime::transport::{
    Channel, InboundFrame, OutboundFrame, Transport, TransportKind,
};

/// Initializes test logging once, honoring `RUST_LOG`.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let default_level = crewdeck_core::config::logging::LoggingConfig::default().level;
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A configuration with short timings suitable for tests.
pub fn fast_config() -> RealtimeConfig {
    let mut config = RealtimeConfig::for_endpoint("http://127.0.0.1:1");
    config.connect_timeout_seconds = 2;
    config.reconnect_base_delay_ms = 10;
    config.reconnect_max_attempts = 5;
    config
}

/// A full camelCase activity event as the server would push it.
pub fn sample_activity(id: &str) -> Value {
    serde_json::json!({
        "id": id,
        "kind": "commit",
        "actorId": "u1",
        "actorName": "Mika",
        "projectId": "p1",
        "projectName": "Dashboard",
        "message": "Added X",
        "occurredAt": "2026-08-05T10:00:00Z"
    })
}

/// One roster entry as the server would push it.
pub fn sample_roster_user(id: &str) -> Value {
    serde_json::json!({
        "userId": id,
        "userName": format!("user-{id}"),
        "status": "online",
        "lastSeenAt": "2026-08-05T10:00:00Z"
    })
}

/// A conflict alert as the server would push it.
pub fn sample_conflict(id: &str, severity: &str) -> Value {
    serde_json::json!({
        "id": id,
        "kind": "simultaneous_edit",
        "projectId": "p1",
        "projectName": "Dashboard",
        "filePath": "src/app.ts",
        "involvedUsers": ["Mika", "Ren"],
        "severity": severity,
        "occurredAt": "2026-08-05T10:00:00Z"
    })
}

/// Polls `condition` until it holds or a 5 second deadline passes.
pub async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// The server side of a mock channel.
pub struct RemoteEnd {
    inbound: Option<mpsc::Sender<InboundFrame>>,
    outbound: mpsc::Receiver<OutboundFrame>,
}

impl RemoteEnd {
    /// Pushes an inbound event to the client.
    pub async fn push(&self, name: &str, data: Value) {
        self.inbound
            .as_ref()
            .expect("remote already closed")
            .send(InboundFrame {
                name: name.to_string(),
                data,
            })
            .await
            .expect("client inbound gone");
    }

    /// Simulates a remote/network closure of the channel.
    pub fn close(&mut self) {
        self.inbound.take();
    }

    /// Next outbound frame the client sent, if one is queued.
    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        self.outbound.try_recv().ok()
    }

    /// Awaits the next outbound frame the client sends.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.outbound.recv().await
    }
}

/// A scripted in-memory transport.
///
/// Each `connect` pops the next scripted outcome (defaulting to success) and,
/// on success, parks a [`RemoteEnd`] for the test to drive.
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Result<(), SyncError>>>,
    remotes: Mutex<VecDeque<RemoteEnd>>,
    connects: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            remotes: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
        })
    }

    /// Scripts the outcome of the next `connect` calls, in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Result<(), SyncError>>) {
        self.outcomes.lock().unwrap().extend(outcomes);
    }

    /// Number of `connect` calls observed.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Takes the remote end of the most recently established channel.
    pub fn take_remote(&self) -> Option<RemoteEnd> {
        self.remotes.lock().unwrap().pop_back()
    }

    /// Waits until a channel has been established and takes its remote end.
    pub async fn next_remote(&self) -> RemoteEnd {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(remote) = self.remotes.lock().unwrap().pop_front() {
                return remote;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for a mock channel");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, _endpoint: &str, _token: &str) -> SyncResult<Channel> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        outcome?;

        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        let channel =
            Channel::from_parts(TransportKind::Socket, out_tx, in_rx, CancellationToken::new());
        self.remotes.lock().unwrap().push_back(RemoteEnd {
            inbound: Some(in_tx),
            outbound: out_rx,
        });
        Ok(channel)
    }
}

/// A transport that always fails with the given error.
pub struct FailingTransport {
    error: SyncError,
    connects: AtomicUsize,
}

impl FailingTransport {
    pub fn new(error: SyncError) -> Arc<Self> {
        Arc::new(Self {
            error,
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FailingTransport {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn connect(&self, _endpoint: &str, _token: &str) -> SyncResult<Channel> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}
