//! Active conflict alerts.

pub mod registry;

pub use registry::ConflictRegistry;
