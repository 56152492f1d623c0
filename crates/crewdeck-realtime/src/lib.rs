//! # crewdeck-realtime
//!
//! Real-time synchronization client for CrewDeck. Provides:
//!
//! - Transport negotiation with fallback (framed multiplexed, raw socket)
//! - Connection lifecycle with backoff-based reconnection
//! - Typed publish/subscribe routing of inbound events
//! - Own-presence state machine driven by explicit and passive signals
//! - Bounded activity history and dismissable conflict alerts
//! - One composable client with an observable snapshot for consumers

pub mod activity;
pub mod client;
pub mod conflict;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod router;
pub mod transport;

pub use activity::ActivityLog;
pub use client::{RealtimeClient, RealtimeSnapshot};
pub use conflict::ConflictRegistry;
pub use connection::{ConnectionManager, ConnectionState};
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use presence::{PresenceController, RosterView};
pub use router::{EventRouter, Subscription};
pub use transport::{Channel, FramedTransport, SocketTransport, Transport, TransportKind};
