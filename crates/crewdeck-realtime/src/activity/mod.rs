//! Bounded activity history.

pub mod log;

pub use log::ActivityLog;
