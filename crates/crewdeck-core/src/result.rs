//! Convenience result type alias for CrewDeck.

use crate::error::SyncError;

/// A specialized `Result` type for CrewDeck sync operations.
///
/// This is defined as a convenience so that every crate does not need to
/// write `Result<T, SyncError>` explicitly.
pub type SyncResult<T> = Result<T, SyncError>;
