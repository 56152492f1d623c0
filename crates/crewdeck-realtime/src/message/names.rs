//! Wire-level event names shared with the collaboration server.

/// Inbound: a new activity feed entry.
pub const ACTIVITY_NEW: &str = "activity:new";
/// Inbound: full presence roster replacement. Outbound: own presence change.
pub const PRESENCE_UPDATE: &str = "presence:update";
/// Inbound: a new conflict alert.
pub const CONFLICT_ALERT: &str = "conflict:alert";

/// Outbound: join a project room.
pub const PROJECT_JOIN: &str = "project:join";
/// Outbound: leave a project room.
pub const PROJECT_LEAVE: &str = "project:leave";
/// Outbound: start editing a file within a room.
pub const FILE_JOIN: &str = "file:join";
/// Outbound: stop editing a file.
pub const FILE_LEAVE: &str = "file:leave";
/// Outbound: typing started in a file.
pub const TYPING_START: &str = "typing:start";
/// Outbound: typing stopped.
pub const TYPING_STOP: &str = "typing:stop";
