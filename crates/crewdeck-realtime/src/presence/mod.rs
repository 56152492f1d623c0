//! Own-presence state machine and the inbound roster view.

pub mod controller;
pub mod roster;

pub use controller::PresenceController;
pub use roster::RosterView;
