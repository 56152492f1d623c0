//! # crewdeck-core
//!
//! Core crate for CrewDeck. Contains configuration schemas, the wire-level
//! domain events pushed by the collaboration server (activity, presence,
//! conflicts), and the unified error system.
//!
//! This crate has **no** internal dependencies on other CrewDeck crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;

pub use error::SyncError;
pub use result::SyncResult;
